use async_trait::async_trait;
use futures::stream::SelectAll;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::Variable;
use rdf_relay_streams::BindingsStreamAdapter;
use spargebra::algebra::GraphPattern;

/// Resolves both branches in parallel and interleaves their outputs as they
/// arrive. One branch erroring ends that branch only; the other keeps
/// streaming, and downstream observes exactly one error event for it.
pub struct UnionOperator;

#[async_trait]
impl Actor<OperationAction> for UnionOperator {
    fn name(&self) -> &'static str {
        "operator-union"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "union" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a union node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Union { left, right } = action.operation else {
            return EngineError::internal("union operator dispatched on a foreign node");
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
        let cardinality = left.cardinality.sum(right.cardinality);
        let mut branches = SelectAll::new();
        branches.push(left.stream);
        branches.push(right.stream);
        Ok(ResolvedBindings::new(
            BindingsStreamAdapter::sendable(variables.into(), branches),
            cardinality,
        ))
    }
}
