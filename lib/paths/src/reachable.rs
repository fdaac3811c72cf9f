use crate::{eval, fresh_variable, term_to_pattern};
use futures::TryStreamExt;
use rdf_relay_api::{EngineView, QuadPatternAction, QueryContext};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{QuadPattern, Term, TermPattern};
use rustc_hash::FxHashSet;
use spargebra::algebra::PropertyPathExpression;

/// The targets of a single `path` step from `start`, deduplicated.
pub(crate) async fn one_step(
    start: &Term,
    path: &PropertyPathExpression,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<Vec<Term>> {
    let target = fresh_variable();
    let resolved = eval(
        term_to_pattern(start),
        path.clone(),
        TermPattern::Variable(target.clone()),
        ctx.clone(),
        view.clone(),
    )
    .await?;
    let solutions: Vec<_> = resolved.stream.try_collect().await?;

    let mut seen = FxHashSet::default();
    let mut targets = Vec::new();
    for bindings in solutions {
        if let Some(term) = bindings.get(&target) {
            if seen.insert(term.clone()) {
                targets.push(term.clone());
            }
        }
    }
    Ok(targets)
}

/// Breadth-first expansion of `path` from `start`.
///
/// Each round evaluates one step of the path from the current frontier and
/// feeds the newly discovered terms into the next one; the visited set both
/// deduplicates the result and guarantees termination on cyclic graphs.
/// `include_start` makes the start term itself reachable in zero steps.
pub(crate) async fn reachable(
    start: Term,
    path: &PropertyPathExpression,
    include_start: bool,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<Vec<Term>> {
    let mut visited = FxHashSet::default();
    let mut reached = Vec::new();
    if include_start {
        visited.insert(start.clone());
        reached.push(start.clone());
    }

    let mut frontier = vec![start];
    let mut round = 0usize;
    while !frontier.is_empty() {
        let mut next = Vec::new();
        for term in frontier {
            for end in one_step(&term, path, ctx, view).await? {
                if visited.insert(end.clone()) {
                    reached.push(end.clone());
                    next.push(end);
                }
            }
        }
        round += 1;
        tracing::trace!(round, frontier = next.len(), "path closure round");
        frontier = next;
    }
    Ok(reached)
}

/// Candidate start terms for a closure with two open endpoints: every
/// subject and object the sources expose for the active graph.
pub(crate) async fn enumerate_terms(
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<Vec<Term>> {
    let pattern = QuadPattern::new(
        TermPattern::Variable(fresh_variable()),
        rdf_relay_model::NamedNodePattern::Variable(fresh_variable()),
        TermPattern::Variable(fresh_variable()),
        ctx.active_graph().clone(),
    );
    let resolved = view
        .quad_patterns
        .mediate(QuadPatternAction::new(pattern), ctx, view)
        .await?;
    let quads: Vec<_> = resolved.stream.try_collect().await?;

    let mut seen = FxHashSet::default();
    let mut terms = Vec::new();
    for quad in quads {
        for term in [Term::from(quad.subject.clone()), quad.object.clone()] {
            if seen.insert(term.clone()) {
                terms.push(term);
            }
        }
    }
    Ok(terms)
}
