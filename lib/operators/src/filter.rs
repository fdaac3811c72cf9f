use crate::expression::{boolean_future, ExpressionEvaluator};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{ready, FutureExt, Stream, StreamExt};
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use spargebra::algebra::{Expression, GraphPattern};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Evaluates the boolean expression per solution and drops the solution on
/// `false` or on an evaluation error. Order is preserved; the reported
/// cardinality upper-bounds the input's.
pub struct FilterOperator;

#[async_trait]
impl Actor<OperationAction> for FilterOperator {
    fn name(&self) -> &'static str {
        "operator-filter"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "filter" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a filter node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Filter { expr, inner } = action.operation else {
            return EngineError::internal("filter operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let cardinality = resolved.cardinality.weaken();
        let variables = Arc::clone(resolved.variables());
        Ok(ResolvedBindings::new(
            Box::pin(FilterStream {
                inner: resolved.stream,
                variables,
                evaluator: ExpressionEvaluator::new(ctx.clone(), view.clone()),
                expression: Arc::new(expr),
                pending: None,
            }),
            cardinality,
        ))
    }
}

struct FilterStream {
    inner: SendableBindingsStream,
    variables: Arc<[Variable]>,
    evaluator: Arc<ExpressionEvaluator>,
    expression: Arc<Expression>,
    /// The in-flight evaluation for the solution currently under test.
    pending: Option<BoxFuture<'static, (Bindings, Option<bool>)>>,
}

impl Stream for FilterStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(pending) = &mut this.pending {
                let (bindings, keep) = ready!(pending.poll_unpin(cx));
                this.pending = None;
                if keep == Some(true) {
                    return Poll::Ready(Some(Ok(bindings)));
                }
                continue;
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(bindings)) => {
                    this.pending = Some(boolean_future(
                        Arc::clone(&this.evaluator),
                        Arc::clone(&this.expression),
                        bindings,
                    ));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl BindingsStream for FilterStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}
