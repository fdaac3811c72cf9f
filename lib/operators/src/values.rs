use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::Bindings;
use spargebra::algebra::GraphPattern;
use spargebra::term::GroundTerm;

/// Emits the declared ground solutions; finite with a known total.
pub struct ValuesOperator;

#[async_trait]
impl Actor<OperationAction> for ValuesOperator {
    fn name(&self) -> &'static str {
        "operator-values"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "values" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a values node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        _ctx: &QueryContext,
        _view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Values {
            variables,
            bindings,
        } = action.operation
        else {
            return EngineError::internal("values operator dispatched on a foreign node");
        };
        let solutions = bindings
            .into_iter()
            .map(|row| {
                variables
                    .iter()
                    .zip(row)
                    .filter_map(|(variable, term)| {
                        let term = match term? {
                            GroundTerm::NamedNode(n) => n.into(),
                            GroundTerm::Literal(l) => l.into(),
                            #[allow(unreachable_patterns)]
                            _ => return None,
                        };
                        Some((variable.clone(), term))
                    })
                    .collect::<Bindings>()
            })
            .collect();
        Ok(ResolvedBindings::from_solutions(variables.into(), solutions))
    }
}
