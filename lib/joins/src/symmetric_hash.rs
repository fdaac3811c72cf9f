use crate::join_key;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use rdf_relay_api::{
    Actor, EngineView, JoinAction, QueryContext, ResolvedBindings, TestMetric, TestOutcome,
};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{Bindings, Term, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Binary symmetric hash join.
///
/// Both sides are consumed incrementally, alternating demand between them.
/// Each side maintains a hash table keyed by the projection over the shared
/// variables; every arriving solution first probes the other side's table,
/// emits the compatible merges, and is then inserted into its own. Memory is
/// proportional to the input sizes, so the actor only passes when both
/// estimates are finite.
///
/// Solutions that leave a shared variable unbound (possible below unions and
/// optionals) cannot be hashed; they are kept in a wildcard list and probed
/// against everything, preserving correctness at nested-loop cost for that
/// slice of the input.
pub struct SymmetricHashJoinActor;

#[async_trait]
impl Actor<JoinAction> for SymmetricHashJoinActor {
    fn name(&self) -> &'static str {
        "join-symmetric-hash"
    }

    fn test(&self, action: &JoinAction, _ctx: &QueryContext) -> TestOutcome {
        if action.entries.len() != 2 {
            return TestOutcome::Rejected("handles exactly two entries");
        }
        if action.shared_variables().is_empty() {
            return TestOutcome::Rejected("no shared variables to hash on");
        }
        let left = action.entries[0].cardinality;
        let right = action.entries[1].cardinality;
        if left.is_infinite() || right.is_infinite() {
            return TestOutcome::Rejected("requires finite cardinality estimates");
        }
        // Build + probe touches every solution once per side.
        TestOutcome::Passed(TestMetric::iterations(left.sum(right)))
    }

    async fn run(
        &self,
        action: JoinAction,
        _ctx: &QueryContext,
        _view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let variables = action.joined_variables();
        let shared = action.shared_variables();
        let cardinality = action.entries[0]
            .cardinality
            .product(action.entries[1].cardinality);
        let mut entries = action.entries;
        let right = entries.pop();
        let left = entries.pop();
        Ok(ResolvedBindings::new(
            Box::pin(SymmetricHashJoinStream {
                variables,
                shared,
                left: left.map(|entry| entry.stream),
                right: right.map(|entry| entry.stream),
                left_table: JoinTable::default(),
                right_table: JoinTable::default(),
                pending: VecDeque::new(),
                poll_left_next: true,
                done: false,
            }),
            cardinality,
        ))
    }
}

/// One side's accumulated solutions.
#[derive(Default)]
struct JoinTable {
    keyed: FxHashMap<Vec<Term>, Vec<Bindings>>,
    wildcards: Vec<Bindings>,
    all: Vec<Bindings>,
}

impl JoinTable {
    fn insert(&mut self, key: Option<Vec<Term>>, bindings: Bindings) {
        match key {
            Some(key) => self.keyed.entry(key).or_default().push(bindings.clone()),
            None => self.wildcards.push(bindings.clone()),
        }
        self.all.push(bindings);
    }

    /// All solutions a newly arrived `bindings` with `key` has to be merged
    /// against.
    fn probe<'a>(
        &'a self,
        key: &Option<Vec<Term>>,
    ) -> Box<dyn Iterator<Item = &'a Bindings> + 'a> {
        match key {
            Some(key) => Box::new(
                self.keyed
                    .get(key)
                    .into_iter()
                    .flatten()
                    .chain(self.wildcards.iter()),
            ),
            None => Box::new(self.all.iter()),
        }
    }
}

struct SymmetricHashJoinStream {
    variables: Arc<[Variable]>,
    shared: Vec<Variable>,
    left: Option<SendableBindingsStream>,
    right: Option<SendableBindingsStream>,
    left_table: JoinTable,
    right_table: JoinTable,
    pending: VecDeque<Bindings>,
    poll_left_next: bool,
    done: bool,
}

impl SymmetricHashJoinStream {
    fn accept(&mut self, from_left: bool, bindings: Bindings) {
        let key = join_key(&bindings, &self.shared);
        let (own, other) = if from_left {
            (&mut self.left_table, &self.right_table)
        } else {
            (&mut self.right_table, &self.left_table)
        };
        self.pending.extend(
            other
                .probe(&key)
                .filter_map(|candidate| candidate.merge_with(&bindings)),
        );
        own.insert(key, bindings);
    }
}

impl Stream for SymmetricHashJoinStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(merged) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(merged)));
            }
            if this.done || (this.left.is_none() && this.right.is_none()) {
                return Poll::Ready(None);
            }

            let mut accepted = None;
            let mut pending_sides = 0;
            for _ in 0..2 {
                let from_left = this.poll_left_next;
                this.poll_left_next = !this.poll_left_next;
                let stream = if from_left {
                    &mut this.left
                } else {
                    &mut this.right
                };
                let Some(side) = stream else { continue };
                match side.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(bindings))) => {
                        accepted = Some((from_left, bindings));
                        break;
                    }
                    Poll::Ready(Some(Err(e))) => {
                        this.done = true;
                        this.left = None;
                        this.right = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Ready(None) => *stream = None,
                    Poll::Pending => pending_sides += 1,
                }
            }

            if let Some((from_left, bindings)) = accepted {
                this.accept(from_left, bindings);
                continue;
            }
            if pending_sides > 0 {
                return Poll::Pending;
            }
            // Both sides ended on this round; loop once more to terminate.
        }
    }
}

impl BindingsStream for SymmetricHashJoinStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::NestedLoopJoinActor;
    use rdf_relay_model::NamedNode;
    use std::collections::HashMap;

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

    async fn multiset(result: ResolvedBindings) -> HashMap<Bindings, usize> {
        let mut counts = HashMap::new();
        let solutions: Vec<_> = result.stream.collect().await;
        for bindings in solutions {
            *counts.entry(bindings.expect("no errors")).or_insert(0) += 1;
        }
        counts
    }

    const LEFT: (&[&str], &[&[(&str, &str)]]) = (
        &["a", "b"],
        &[
            &[("a", "1"), ("b", "x")],
            &[("a", "2"), ("b", "y")],
            &[("a", "3"), ("b", "x")],
        ],
    );
    const RIGHT: (&[&str], &[&[(&str, &str)]]) = (
        &["b", "c"],
        &[&[("b", "x"), ("c", "7")], &[("b", "z"), ("c", "8")]],
    );

    #[tokio::test]
    async fn hash_join_matches_on_the_shared_variable() {
        let joined = SymmetricHashJoinActor
            .run(
                JoinAction {
                    entries: vec![entry(LEFT.0, LEFT.1), entry(RIGHT.0, RIGHT.1)],
                },
                &QueryContext::new(),
                &crate::test_support::dummy_view(),
            )
            .await
            .expect("join runs");
        let out = multiset(joined).await;
        assert_eq!(out.len(), 2);
        assert!(out.keys().all(|bindings| {
            bindings.get(&var("b")) == Some(&iri("x")) && bindings.get(&var("c")) == Some(&iri("7"))
        }));
    }

    #[tokio::test]
    async fn join_commutes_and_agrees_with_nested_loop() {
        let view = crate::test_support::dummy_view();
        let ctx = QueryContext::new();
        let mut outputs = Vec::new();
        for flip in [false, true] {
            let (first, second) = if flip { (RIGHT, LEFT) } else { (LEFT, RIGHT) };
            let entries = vec![entry(first.0, first.1), entry(second.0, second.1)];
            outputs.push(
                multiset(
                    SymmetricHashJoinActor
                        .run(JoinAction { entries }, &ctx, &view)
                        .await
                        .expect("join runs"),
                )
                .await,
            );
            let entries = vec![entry(first.0, first.1), entry(second.0, second.1)];
            outputs.push(
                multiset(
                    NestedLoopJoinActor
                        .run(JoinAction { entries }, &ctx, &view)
                        .await
                        .expect("join runs"),
                )
                .await,
            );
        }
        assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn solutions_with_an_unbound_join_variable_still_match() {
        // The second left solution leaves ?b unbound, as below an OPTIONAL.
        let variables: Arc<[Variable]> = Arc::new([var("a"), var("b")]);
        let left = ResolvedBindings::from_solutions(
            variables,
            vec![
                Bindings::from_iter([(var("a"), iri("1")), (var("b"), iri("x"))]),
                Bindings::from_iter([(var("a"), iri("2"))]),
            ],
        );
        let right = entry(&["b", "c"], &[&[("b", "x"), ("c", "7")]]);
        let joined = SymmetricHashJoinActor
            .run(
                JoinAction {
                    entries: vec![left, right],
                },
                &QueryContext::new(),
                &crate::test_support::dummy_view(),
            )
            .await
            .expect("join runs");
        let out = multiset(joined).await;
        // Both left solutions are compatible with the single right one.
        assert_eq!(out.values().sum::<usize>(), 2);
    }
}
