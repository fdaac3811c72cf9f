use async_trait::async_trait;
use rdf_relay_api::{
    Actor, EngineView, JoinAction, QueryContext, ResolvedBindings, TestMetric, TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineResult};

/// Joins three or more entries by reordering them by ascending cardinality
/// and left-folding pairs through the join mediator, so each binary step is
/// again cost-mediated.
pub struct MultiwayJoinActor;

#[async_trait]
impl Actor<JoinAction> for MultiwayJoinActor {
    fn name(&self) -> &'static str {
        "join-multiway"
    }

    fn test(&self, action: &JoinAction, _ctx: &QueryContext) -> TestOutcome {
        if action.entries.len() < 3 {
            return TestOutcome::Rejected("handles three or more entries");
        }
        let estimate = action
            .entries
            .iter()
            .fold(Cardinality::Exact(1), |product, entry| {
                product.product(entry.cardinality)
            });
        TestOutcome::Passed(TestMetric::iterations(estimate))
    }

    async fn run(
        &self,
        action: JoinAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let mut entries = action.entries;
        entries.sort_by_key(|entry| entry.cardinality.cost_key());
        let mut entries = entries.into_iter();
        let Some(mut folded) = entries.next() else {
            return Ok(ResolvedBindings::empty([].into()));
        };
        for entry in entries {
            folded = view
                .joins
                .mediate(
                    JoinAction {
                        entries: vec![folded, entry],
                    },
                    ctx,
                    view,
                )
                .await?;
        }
        Ok(folded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rdf_relay_model::{Bindings, NamedNode, Term, Variable};
    use std::sync::Arc;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn iri(value: &str) -> Term {
        NamedNode::new_unchecked(format!("http://example.com/{value}")).into()
    }

    fn entry(variables: &[&str], rows: &[&[(&str, &str)]]) -> ResolvedBindings {
        let variables: Arc<[Variable]> = variables.iter().map(|v| var(v)).collect();
        let solutions = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(v, t)| (var(v), iri(t)))
                    .collect::<Bindings>()
            })
            .collect();
        ResolvedBindings::from_solutions(variables, solutions)
    }

    #[tokio::test]
    async fn folds_three_entries_into_one_chain() {
        let view = crate::test_support::dummy_view();
        let joined = MultiwayJoinActor
            .run(
                JoinAction {
                    entries: vec![
                        entry(&["a", "b"], &[&[("a", "1"), ("b", "2")]]),
                        entry(&["b", "c"], &[&[("b", "2"), ("c", "3")]]),
                        entry(&["c", "d"], &[&[("c", "3"), ("d", "4")], &[("c", "9"), ("d", "5")]]),
                    ],
                },
                &QueryContext::new(),
                &view,
            )
            .await
            .expect("join runs");
        let out: Vec<_> = joined.stream.collect().await;
        assert_eq!(out.len(), 1);
        let bindings = out.into_iter().next().expect("one solution").expect("ok");
        assert_eq!(bindings.get(&var("d")), Some(&iri("4")));
        assert_eq!(bindings.len(), 4);
    }
}
