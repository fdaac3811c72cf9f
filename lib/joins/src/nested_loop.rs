use async_trait::async_trait;
use futures::{ready, Stream, StreamExt};
use rdf_relay_api::{
    Actor, EngineView, JoinAction, QueryContext, ResolvedBindings, TestMetric, TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Binary nested-loop join: buffers the side with the smaller estimate and
/// probes it with every solution of the other side.
///
/// This is the universal fallback; it passes for any two entries, including
/// cross products and entries with unknown cardinality. Its iteration
/// estimate is the product of the inputs'.
pub struct NestedLoopJoinActor;

#[async_trait]
impl Actor<JoinAction> for NestedLoopJoinActor {
    fn name(&self) -> &'static str {
        "join-nested-loop"
    }

    fn test(&self, action: &JoinAction, _ctx: &QueryContext) -> TestOutcome {
        if action.entries.len() != 2 {
            return TestOutcome::Rejected("handles exactly two entries");
        }
        let estimate = action.entries[0]
            .cardinality
            .product(action.entries[1].cardinality);
        TestOutcome::Passed(TestMetric::iterations(estimate))
    }

    async fn run(
        &self,
        action: JoinAction,
        _ctx: &QueryContext,
        _view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let variables = action.joined_variables();
        let cardinality = action.entries[0]
            .cardinality
            .product(action.entries[1].cardinality);
        let mut entries = action.entries;
        let probe = entries.pop().ok_or(EngineError::Internal(
            "join action lost an entry".to_owned(),
        ))?;
        let build = entries.pop().ok_or(EngineError::Internal(
            "join action lost an entry".to_owned(),
        ))?;
        // Buffer the smaller side, stream the larger one.
        let (build, probe) = if probe.cardinality.cost_key() < build.cardinality.cost_key() {
            (probe, build)
        } else {
            (build, probe)
        };
        Ok(ResolvedBindings::new(
            Box::pin(NestedLoopJoinStream {
                variables,
                state: NestedLoopState::Buffering {
                    build: build.stream,
                    probe: Some(probe.stream),
                },
                buffered: Vec::new(),
                matches: VecDeque::new(),
            }),
            cardinality,
        ))
    }
}

enum NestedLoopState {
    /// Drain the build side into the buffer.
    Buffering {
        build: SendableBindingsStream,
        probe: Option<SendableBindingsStream>,
    },
    /// Probe the buffer with each solution of the other side.
    Probing { probe: SendableBindingsStream },
    Done,
}

struct NestedLoopJoinStream {
    variables: Arc<[Variable]>,
    state: NestedLoopState,
    buffered: Vec<Bindings>,
    matches: VecDeque<Bindings>,
}

impl Stream for NestedLoopJoinStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(merged) = this.matches.pop_front() {
                return Poll::Ready(Some(Ok(merged)));
            }
            match &mut this.state {
                NestedLoopState::Buffering { build, probe } => {
                    match ready!(build.poll_next_unpin(cx)) {
                        Some(Ok(bindings)) => this.buffered.push(bindings),
                        Some(Err(e)) => {
                            this.state = NestedLoopState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        None => {
                            let Some(probe) = probe.take() else {
                                this.state = NestedLoopState::Done;
                                continue;
                            };
                            this.state = NestedLoopState::Probing { probe };
                        }
                    }
                }
                NestedLoopState::Probing { probe } => {
                    match ready!(probe.poll_next_unpin(cx)) {
                        Some(Ok(bindings)) => {
                            this.matches.extend(
                                this.buffered
                                    .iter()
                                    .filter_map(|buffered| buffered.merge_with(&bindings)),
                            );
                        }
                        Some(Err(e)) => {
                            this.state = NestedLoopState::Done;
                            return Poll::Ready(Some(Err(e)));
                        }
                        None => this.state = NestedLoopState::Done,
                    }
                }
                NestedLoopState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl BindingsStream for NestedLoopJoinStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_relay_model::{NamedNode, Term};

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

    async fn collect(result: ResolvedBindings) -> Vec<Bindings> {
        result
            .stream
            .map(|bindings| bindings.expect("no errors"))
            .collect()
            .await
    }

    #[tokio::test]
    async fn joins_on_the_shared_variable() {
        let left = entry(&["a", "b"], &[&[("a", "1"), ("b", "2")]]);
        let right = entry(
            &["b", "c"],
            &[&[("b", "2"), ("c", "3")], &[("b", "9"), ("c", "4")]],
        );
        let joined = NestedLoopJoinActor
            .run(
                JoinAction {
                    entries: vec![left, right],
                },
                &QueryContext::new(),
                &crate::test_support::dummy_view(),
            )
            .await
            .expect("join runs");
        assert_eq!(
            &**joined.variables(),
            &[var("a"), var("b"), var("c")][..]
        );
        let out = collect(joined).await;
        assert_eq!(
            out,
            vec![Bindings::from_iter([
                (var("a"), iri("1")),
                (var("b"), iri("2")),
                (var("c"), iri("3")),
            ])]
        );
    }

    #[tokio::test]
    async fn a_cross_product_pairs_everything() {
        let left = entry(&["a"], &[&[("a", "1")], &[("a", "2")]]);
        let right = entry(&["b"], &[&[("b", "3")]]);
        let joined = NestedLoopJoinActor
            .run(
                JoinAction {
                    entries: vec![left, right],
                },
                &QueryContext::new(),
                &crate::test_support::dummy_view(),
            )
            .await
            .expect("join runs");
        assert_eq!(collect(joined).await.len(), 2);
    }
}
