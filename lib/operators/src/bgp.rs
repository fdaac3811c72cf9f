use async_trait::async_trait;
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, QuadPattern, Variable};
use spargebra::algebra::GraphPattern;
use spargebra::term::{TermPattern, TriplePattern};

/// Resolves a basic graph pattern: every triple pattern is resolved against
/// the quad-pattern bus in parallel, and the entries are handed to the join
/// mediator, which orders them by estimated cardinality.
///
/// Query blank nodes are rewritten to internal variables first so they
/// co-refer across the patterns of the group; they are dropped again by the
/// enclosing projection.
pub struct BgpOperator;

#[async_trait]
impl Actor<OperationAction> for BgpOperator {
    fn name(&self) -> &'static str {
        "operator-bgp"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "bgp" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a bgp node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Bgp { patterns } = action.operation else {
            return EngineError::internal("bgp operator dispatched on a foreign node");
        };
        // The empty group matches once, with nothing bound.
        if patterns.is_empty() {
            return Ok(ResolvedBindings::from_solutions(
                [].into(),
                vec![Bindings::new()],
            ));
        }

        let resolutions = patterns.iter().map(|pattern| {
            let pattern =
                QuadPattern::from_triple(&blank_nodes_to_variables(pattern), ctx.active_graph());
            view.resolve_quad_pattern(pattern, ctx)
        });
        let entries = futures::future::try_join_all(resolutions).await?;
        rdf_relay_joins::mediate_join(entries, ctx, view).await
    }
}

fn blank_nodes_to_variables(pattern: &TriplePattern) -> TriplePattern {
    let rewrite = |position: &TermPattern| match position {
        TermPattern::BlankNode(b) => {
            TermPattern::Variable(Variable::new_unchecked(format!("rr_bnode_{}", b.as_str())))
        }
        other => other.clone(),
    };
    TriplePattern {
        subject: rewrite(&pattern.subject),
        predicate: pattern.predicate.clone(),
        object: rewrite(&pattern.object),
    }
}
