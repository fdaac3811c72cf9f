use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_paths::PathEvaluator;
use spargebra::algebra::GraphPattern;

/// Delegates property-path nodes to the path sub-engine.
pub struct PathOperator;

#[async_trait]
impl Actor<OperationAction> for PathOperator {
    fn name(&self) -> &'static str {
        "operator-path"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "path" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a path node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Path {
            subject,
            path,
            object,
        } = action.operation
        else {
            return EngineError::internal("path operator dispatched on a foreign node");
        };
        PathEvaluator::evaluate(&subject, &path, &object, ctx, view).await
    }
}
