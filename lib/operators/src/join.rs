use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use spargebra::algebra::GraphPattern;

/// Resolves both join inputs in parallel and delegates the pairing to the
/// cost-mediated join bus.
pub struct JoinOperator;

#[async_trait]
impl Actor<OperationAction> for JoinOperator {
    fn name(&self) -> &'static str {
        "operator-join"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "join" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a join node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Join { left, right } = action.operation else {
            return EngineError::internal("join operator dispatched on a foreign node");
        };
        let (left, right) = futures::future::try_join(
            view.evaluate_operation(*left, ctx),
            view.evaluate_operation(*right, ctx),
        )
        .await?;
        rdf_relay_joins::mediate_join(vec![left, right], ctx, view).await
    }
}
