use crate::expression::ExpressionEvaluator;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{ready, FutureExt, Stream, StreamExt};
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use spargebra::algebra::{Expression, GraphPattern};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// `OPTIONAL`: left solutions that match the right side are emitted merged;
/// the ones that match nothing are emitted unchanged. The optional filter is
/// evaluated on each merged pair before it counts as a match. Output order is
/// stable with respect to the left side.
pub struct LeftJoinOperator;

#[async_trait]
impl Actor<OperationAction> for LeftJoinOperator {
    fn name(&self) -> &'static str {
        "operator-leftjoin"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "leftjoin" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a leftjoin node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } = action.operation
        else {
            return EngineError::internal("leftjoin operator dispatched on a foreign node");
        };
        let (left, right) = futures::future::try_join(
            view.evaluate_operation(*left, ctx),
            view.evaluate_operation(*right, ctx),
        )
        .await?;

        let mut variables: Vec<Variable> = left.variables().to_vec();
        for variable in right.variables().iter() {
            if !variables.contains(variable) {
                variables.push(variable.clone());
            }
        }
        // Every left solution survives at least once.
        let cardinality = left
            .cardinality
            .product(right.cardinality.sum(Cardinality::Exact(1)))
            .weaken();
        Ok(ResolvedBindings::new(
            Box::pin(LeftJoinStream {
                variables: variables.into(),
                state: LeftJoinState::CollectingRight {
                    left: Some(left.stream),
                    right: right.stream,
                },
                buffered: Vec::new(),
                evaluator: ExpressionEvaluator::new(ctx.clone(), view.clone()),
                expression: expression.map(Arc::new),
                pending: None,
                emit: VecDeque::new(),
            }),
            cardinality,
        ))
    }
}

enum LeftJoinState {
    CollectingRight {
        left: Option<SendableBindingsStream>,
        right: SendableBindingsStream,
    },
    Streaming {
        left: SendableBindingsStream,
        right: Arc<Vec<Bindings>>,
    },
    Done,
}

struct LeftJoinStream {
    variables: Arc<[Variable]>,
    state: LeftJoinState,
    buffered: Vec<Bindings>,
    evaluator: Arc<ExpressionEvaluator>,
    expression: Option<Arc<Expression>>,
    /// Processes one left solution against the whole right buffer.
    pending: Option<BoxFuture<'static, Vec<Bindings>>>,
    emit: VecDeque<Bindings>,
}

impl Stream for LeftJoinStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(bindings) = this.emit.pop_front() {
                return Poll::Ready(Some(Ok(bindings)));
            }
            if let Some(pending) = &mut this.pending {
                let survivors = ready!(pending.poll_unpin(cx));
                this.pending = None;
                this.emit.extend(survivors);
                continue;
            }
            match &mut this.state {
                LeftJoinState::CollectingRight { left, right } => {
                    match ready!(right.poll_next_unpin(cx)) {
                        Some(Ok(bindings)) => this.buffered.push(bindings),
                        Some(Err(e)) => {
                            this.state = LeftJoinState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        None => {
                            let Some(left) = left.take() else {
                                this.state = LeftJoinState::Done;
                                continue;
                            };
                            this.state = LeftJoinState::Streaming {
                                left,
                                right: Arc::new(std::mem::take(&mut this.buffered)),
                            };
                        }
                    }
                }
                LeftJoinState::Streaming { left, right } => {
                    match ready!(left.poll_next_unpin(cx)) {
                        Some(Ok(bindings)) => {
                            this.pending = Some(pair_left(
                                Arc::clone(&this.evaluator),
                                this.expression.clone(),
                                bindings,
                                Arc::clone(right),
                            ));
                        }
                        Some(Err(e)) => {
                            this.state = LeftJoinState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        None => this.state = LeftJoinState::Done,
                    }
                }
                LeftJoinState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl BindingsStream for LeftJoinStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}

fn pair_left(
    evaluator: Arc<ExpressionEvaluator>,
    expression: Option<Arc<Expression>>,
    left: Bindings,
    right: Arc<Vec<Bindings>>,
) -> BoxFuture<'static, Vec<Bindings>> {
    async move {
        let mut survivors = Vec::new();
        for candidate in right.iter() {
            let Some(merged) = left.merge_with(candidate) else {
                continue;
            };
            let keep = match &expression {
                None => true,
                Some(expression) => {
                    evaluator.boolean(expression, &merged).await == Some(true)
                }
            };
            if keep {
                survivors.push(merged);
            }
        }
        if survivors.is_empty() {
            survivors.push(left);
        }
        survivors
    }
    .boxed()
}
