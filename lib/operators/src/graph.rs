use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use spargebra::algebra::GraphPattern;
use spargebra::term::{GraphNamePattern, NamedNodePattern};

/// `GRAPH g { … }`: evaluates the inner pattern with the context's active
/// graph set to `g`. A variable graph name ranges over the sources' named
/// graphs; pattern resolution binds it per matched quad.
pub struct GraphOperator;

#[async_trait]
impl Actor<OperationAction> for GraphOperator {
    fn name(&self) -> &'static str {
        "operator-graph"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "graph" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a graph node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Graph { name, inner } = action.operation else {
            return EngineError::internal("graph operator dispatched on a foreign node");
        };
        let active_graph = match name {
            NamedNodePattern::NamedNode(n) => GraphNamePattern::NamedNode(n),
            NamedNodePattern::Variable(v) => GraphNamePattern::Variable(v),
        };
        let ctx = ctx.with_active_graph(active_graph);
        view.evaluate_operation(*inner, &ctx).await
    }
}
