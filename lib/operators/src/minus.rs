use async_trait::async_trait;
use futures::{ready, Stream, StreamExt};
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use spargebra::algebra::GraphPattern;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// `MINUS`: emits the left solutions for which no right solution is both
/// compatible and domain-overlapping. Right solutions that share no variable
/// with a left solution do not exclude it, per SPARQL semantics.
pub struct MinusOperator;

#[async_trait]
impl Actor<OperationAction> for MinusOperator {
    fn name(&self) -> &'static str {
        "operator-minus"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "minus" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a minus node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Minus { left, right } = action.operation else {
            return EngineError::internal("minus operator dispatched on a foreign node");
        };
        let (left, right) = futures::future::try_join(
            view.evaluate_operation(*left, ctx),
            view.evaluate_operation(*right, ctx),
        )
        .await?;
        let variables = Arc::clone(left.variables());
        let cardinality = left.cardinality.weaken();
        Ok(ResolvedBindings::new(
            Box::pin(MinusStream {
                variables,
                state: MinusState::CollectingRight {
                    left: Some(left.stream),
                    right: right.stream,
                },
                buffered: Vec::new(),
            }),
            cardinality,
        ))
    }
}

enum MinusState {
    CollectingRight {
        left: Option<SendableBindingsStream>,
        right: SendableBindingsStream,
    },
    Streaming { left: SendableBindingsStream },
    Done,
}

struct MinusStream {
    variables: Arc<[Variable]>,
    state: MinusState,
    buffered: Vec<Bindings>,
}

impl Stream for MinusStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                MinusState::CollectingRight { left, right } => {
                    match ready!(right.poll_next_unpin(cx)) {
                        Some(Ok(bindings)) => this.buffered.push(bindings),
                        Some(Err(e)) => {
                            this.state = MinusState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        None => {
                            let Some(left) = left.take() else {
                                this.state = MinusState::Done;
                                continue;
                            };
                            this.state = MinusState::Streaming { left };
                        }
                    }
                }
                MinusState::Streaming { left } => match ready!(left.poll_next_unpin(cx)) {
                    Some(Ok(bindings)) => {
                        let excluded = this.buffered.iter().any(|candidate| {
                            bindings.is_compatible_with(candidate)
                                && bindings.shares_variable_with(candidate)
                        });
                        if !excluded {
                            return Poll::Ready(Some(Ok(bindings)));
                        }
                    }
                    Some(Err(e)) => {
                        this.state = MinusState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                    None => this.state = MinusState::Done,
                },
                MinusState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl BindingsStream for MinusStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}
