use async_trait::async_trait;
use futures::TryStreamExt;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::Variable;
use rdf_relay_streams::BindingsStreamAdapter;
use spargebra::algebra::GraphPattern;
use std::sync::Arc;

/// Restricts every solution to the declared variables.
///
/// The declared list becomes the output's variables verbatim, preserving its
/// order for serialization; metadata passes through.
pub struct ProjectOperator;

#[async_trait]
impl Actor<OperationAction> for ProjectOperator {
    fn name(&self) -> &'static str {
        "operator-project"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "project" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a project node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Project { inner, variables } = action.operation else {
            return EngineError::internal("project operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let cardinality = resolved.cardinality;
        let declared: Arc<[Variable]> = variables.clone().into();
        let stream = resolved
            .stream
            .map_ok(move |bindings| bindings.project(&variables));
        Ok(ResolvedBindings::new(
            BindingsStreamAdapter::sendable(declared, Box::pin(stream)),
            cardinality,
        ))
    }
}
