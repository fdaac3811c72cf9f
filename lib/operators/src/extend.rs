use crate::expression::{term_future, ExpressionEvaluator};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{ready, FutureExt, Stream, StreamExt};
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Term, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use spargebra::algebra::{Expression, GraphPattern};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// `BIND`: evaluates the expression per solution and binds the result to the
/// target variable. An evaluation error leaves the variable unbound, per
/// SPARQL semantics.
pub struct ExtendOperator;

#[async_trait]
impl Actor<OperationAction> for ExtendOperator {
    fn name(&self) -> &'static str {
        "operator-extend"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "extend" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not an extend node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Extend {
            inner,
            variable,
            expression,
        } = action.operation
        else {
            return EngineError::internal("extend operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        if resolved.variables().contains(&variable) {
            return EngineError::invariant(format!(
                "extend target {variable} is already bound by its input"
            ));
        }
        let cardinality = resolved.cardinality;
        let mut variables: Vec<Variable> = resolved.variables().to_vec();
        variables.push(variable.clone());
        Ok(ResolvedBindings::new(
            Box::pin(ExtendStream {
                inner: resolved.stream,
                variables: variables.into(),
                target: variable,
                evaluator: ExpressionEvaluator::new(ctx.clone(), view.clone()),
                expression: Arc::new(expression),
                pending: None,
            }),
            cardinality,
        ))
    }
}

struct ExtendStream {
    inner: SendableBindingsStream,
    variables: Arc<[Variable]>,
    target: Variable,
    evaluator: Arc<ExpressionEvaluator>,
    expression: Arc<Expression>,
    pending: Option<BoxFuture<'static, (Bindings, Option<Term>)>>,
}

impl Stream for ExtendStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(pending) = &mut this.pending {
                let (bindings, value) = ready!(pending.poll_unpin(cx));
                this.pending = None;
                let extended = match value {
                    Some(term) => bindings.bind(this.target.clone(), term),
                    None => bindings,
                };
                return Poll::Ready(Some(Ok(extended)));
            }
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(bindings)) => {
                    this.pending = Some(term_future(
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

impl BindingsStream for ExtendStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}
