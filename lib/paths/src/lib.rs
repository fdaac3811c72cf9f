mod reachable;

use futures::future::BoxFuture;
use futures::stream::SelectAll;
use futures::{FutureExt, TryStreamExt};
use rdf_relay_api::{EngineView, QueryContext, ResolvedBindings};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, NamedNode, QuadPattern, Term, TermPattern, Variable};
use rdf_relay_streams::BindingsStreamAdapter;
use reachable::{enumerate_terms, one_step, reachable};
use spargebra::algebra::PropertyPathExpression;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prefix of the fresh variables the path engine introduces for sequence
/// joins and negated-property-set predicates. They are stripped from every
/// result before it leaves this crate.
const FRESH_PREFIX: &str = "__path_";

static FRESH_COUNTER: AtomicU64 = AtomicU64::new(0);

fn fresh_variable() -> Variable {
    let n = FRESH_COUNTER.fetch_add(1, Ordering::Relaxed);
    Variable::new_unchecked(format!("{FRESH_PREFIX}{n}"))
}

/// Evaluates property-path expressions by lowering them onto the quad-pattern
/// and join buses.
///
/// Links and negated property sets stay streaming; the closure forms
/// (`*`, `+`, `?`) expand breadth-first with a visited set over endpoint
/// terms, so they terminate and deduplicate on cyclic graphs. Closure results
/// are materialized before emission and therefore carry exact cardinalities.
pub struct PathEvaluator;

impl PathEvaluator {
    pub async fn evaluate(
        subject: &TermPattern,
        path: &PropertyPathExpression,
        object: &TermPattern,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        for endpoint in [subject, object] {
            if let TermPattern::Variable(v) = endpoint {
                if v.as_str().starts_with(FRESH_PREFIX) {
                    return EngineError::invariant(format!(
                        "variable {v} collides with the path engine's fresh variables"
                    ));
                }
            }
        }
        let subject = substitute_endpoint(subject, ctx.initial_bindings());
        let object = substitute_endpoint(object, ctx.initial_bindings());
        eval(subject, path.clone(), object, ctx.clone(), view.clone()).await
    }
}

/// Boxed recursion: path forms nest arbitrarily and sequences re-enter the
/// evaluator from both sides of a join.
fn eval(
    subject: TermPattern,
    path: PropertyPathExpression,
    object: TermPattern,
    ctx: QueryContext,
    view: EngineView,
) -> BoxFuture<'static, EngineResult<ResolvedBindings>> {
    async move {
        match path {
            PropertyPathExpression::NamedNode(predicate) => {
                link(subject, predicate, object, &ctx, &view).await
            }
            PropertyPathExpression::Reverse(inner) => {
                eval(object, *inner, subject, ctx, view).await
            }
            PropertyPathExpression::Sequence(left, right) => {
                sequence(subject, *left, *right, object, &ctx, &view).await
            }
            PropertyPathExpression::Alternative(left, right) => {
                alternative(subject, *left, *right, object, ctx, view).await
            }
            PropertyPathExpression::ZeroOrMore(inner) => {
                closure(subject, *inner, object, true, &ctx, &view).await
            }
            PropertyPathExpression::OneOrMore(inner) => {
                closure(subject, *inner, object, false, &ctx, &view).await
            }
            PropertyPathExpression::ZeroOrOne(inner) => {
                zero_or_one(subject, *inner, object, &ctx, &view).await
            }
            PropertyPathExpression::NegatedPropertySet(forbidden) => {
                negated_property_set(subject, forbidden, object, &ctx, &view).await
            }
        }
    }
    .boxed()
}

/// A single quad-pattern match.
async fn link(
    subject: TermPattern,
    predicate: NamedNode,
    object: TermPattern,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    let pattern = QuadPattern::new(subject, predicate, object, ctx.active_graph().clone());
    view.resolve_quad_pattern(pattern, ctx).await
}

/// `s (l / r) o`: join `s l ?v` with `?v r o` on a fresh `?v`, then strip it.
async fn sequence(
    subject: TermPattern,
    left: PropertyPathExpression,
    right: PropertyPathExpression,
    object: TermPattern,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    let middle = fresh_variable();
    let left = eval(
        subject,
        left,
        TermPattern::Variable(middle.clone()),
        ctx.clone(),
        view.clone(),
    )
    .await?;
    let right = eval(
        TermPattern::Variable(middle.clone()),
        right,
        object,
        ctx.clone(),
        view.clone(),
    )
    .await?;
    let joined = rdf_relay_joins::mediate_join(vec![left, right], ctx, view).await?;

    let variables: Arc<[Variable]> = joined
        .variables()
        .iter()
        .filter(|variable| **variable != middle)
        .cloned()
        .collect();
    let cardinality = joined.cardinality;
    let stream = joined
        .stream
        .map_ok(move |bindings| bindings.without(&middle));
    Ok(ResolvedBindings::new(
        BindingsStreamAdapter::sendable(variables, Box::pin(stream)),
        cardinality,
    ))
}

/// `s (l | r) o`: the union of both branches.
async fn alternative(
    subject: TermPattern,
    left: PropertyPathExpression,
    right: PropertyPathExpression,
    object: TermPattern,
    ctx: QueryContext,
    view: EngineView,
) -> EngineResult<ResolvedBindings> {
    let left = eval(
        subject.clone(),
        left,
        object.clone(),
        ctx.clone(),
        view.clone(),
    )
    .await?;
    let right = eval(subject, right, object, ctx, view).await?;

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

/// `s p* o` / `s p+ o`: breadth-first expansion from the ground endpoint;
/// `with_identity` distinguishes zero-or-more from one-or-more.
async fn closure(
    subject: TermPattern,
    inner: PropertyPathExpression,
    object: TermPattern,
    with_identity: bool,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    require_ground_graph(ctx)?;
    let variables = endpoint_variables(&subject, &object);
    let mut solutions = Vec::new();
    match (ground_term(&subject), ground_term(&object)) {
        (Some(start), _) => {
            for end in reachable(start.clone(), &inner, with_identity, ctx, view).await? {
                extend_solutions(&mut solutions, &subject, &object, &start, &end);
            }
        }
        (None, Some(end)) => {
            let inverse = PropertyPathExpression::Reverse(Box::new(inner));
            for start in reachable(end.clone(), &inverse, with_identity, ctx, view).await? {
                extend_solutions(&mut solutions, &subject, &object, &start, &end);
            }
        }
        (None, None) => {
            // Both endpoints open: enumerate candidate start terms from the
            // sources. Over sources that page finitely this terminates; the
            // behavior over unbounded term spaces is implementation-defined.
            for start in enumerate_terms(ctx, view).await? {
                for end in reachable(start.clone(), &inner, with_identity, ctx, view).await? {
                    extend_solutions(&mut solutions, &subject, &object, &start, &end);
                }
            }
        }
    }
    Ok(ResolvedBindings::from_solutions(variables, solutions))
}

/// `s p? o`: the identity union one step of `p`.
async fn zero_or_one(
    subject: TermPattern,
    inner: PropertyPathExpression,
    object: TermPattern,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    require_ground_graph(ctx)?;
    let variables = endpoint_variables(&subject, &object);
    let mut solutions = Vec::new();
    match (ground_term(&subject), ground_term(&object)) {
        (Some(start), _) => {
            extend_solutions(&mut solutions, &subject, &object, &start, &start);
            for end in one_step(&start, &inner, ctx, view).await? {
                if end != start {
                    extend_solutions(&mut solutions, &subject, &object, &start, &end);
                }
            }
        }
        (None, Some(end)) => {
            extend_solutions(&mut solutions, &subject, &object, &end, &end);
            let inverse = PropertyPathExpression::Reverse(Box::new(inner));
            for start in one_step(&end, &inverse, ctx, view).await? {
                if start != end {
                    extend_solutions(&mut solutions, &subject, &object, &start, &end);
                }
            }
        }
        (None, None) => {
            for term in enumerate_terms(ctx, view).await? {
                extend_solutions(&mut solutions, &subject, &object, &term, &term);
                for end in one_step(&term, &inner, ctx, view).await? {
                    if end != term {
                        extend_solutions(&mut solutions, &subject, &object, &term, &end);
                    }
                }
            }
        }
    }
    Ok(ResolvedBindings::from_solutions(variables, solutions))
}

/// `s !(p1 | … | pn) o`: resolve with a fresh predicate variable, drop the
/// forbidden IRIs, and strip the predicate from the results.
async fn negated_property_set(
    subject: TermPattern,
    forbidden: Vec<NamedNode>,
    object: TermPattern,
    ctx: &QueryContext,
    view: &EngineView,
) -> EngineResult<ResolvedBindings> {
    let predicate = fresh_variable();
    let pattern = QuadPattern::new(
        subject,
        predicate.clone(),
        object,
        ctx.active_graph().clone(),
    );
    let resolved = view.resolve_quad_pattern(pattern, ctx).await?;

    let variables: Arc<[Variable]> = resolved
        .variables()
        .iter()
        .filter(|variable| **variable != predicate)
        .cloned()
        .collect();
    let cardinality = resolved.cardinality.weaken();
    let stream = resolved.stream.try_filter_map(move |bindings| {
        let kept = match bindings.get(&predicate) {
            Some(Term::NamedNode(p)) if forbidden.contains(p) => None,
            _ => Some(bindings.without(&predicate)),
        };
        async move { Ok(kept) }
    });
    Ok(ResolvedBindings::new(
        BindingsStreamAdapter::sendable(variables, Box::pin(stream)),
        cardinality,
    ))
}

fn substitute_endpoint(endpoint: &TermPattern, bindings: &Bindings) -> TermPattern {
    if let TermPattern::Variable(v) = endpoint {
        if let Some(term) = bindings.get(v) {
            return term_to_pattern(term);
        }
    }
    endpoint.clone()
}

pub(crate) fn term_to_pattern(term: &Term) -> TermPattern {
    match term {
        Term::NamedNode(n) => TermPattern::NamedNode(n.clone()),
        Term::BlankNode(b) => TermPattern::BlankNode(b.clone()),
        Term::Literal(l) => TermPattern::Literal(l.clone()),
    }
}

fn ground_term(endpoint: &TermPattern) -> Option<Term> {
    match endpoint {
        TermPattern::NamedNode(n) => Some(n.clone().into()),
        TermPattern::BlankNode(b) => Some(b.clone().into()),
        TermPattern::Literal(l) => Some(l.clone().into()),
        TermPattern::Variable(_) => None,
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// The variables a path result exposes: its variable endpoints, in subject,
/// object order. Fresh variables never appear here.
fn endpoint_variables(subject: &TermPattern, object: &TermPattern) -> Arc<[Variable]> {
    let mut variables = Vec::new();
    for endpoint in [subject, object] {
        if let TermPattern::Variable(v) = endpoint {
            if !variables.contains(v) {
                variables.push(v.clone());
            }
        }
    }
    variables.into()
}

/// Binds the endpoint patterns to a discovered (start, end) pair. `None`
/// when a ground endpoint disagrees or a repeated variable would have to
/// take two values.
fn bind_endpoints(
    subject: &TermPattern,
    object: &TermPattern,
    start: &Term,
    end: &Term,
) -> Option<Bindings> {
    let bindings = bind_endpoint(Bindings::new(), subject, start)?;
    bind_endpoint(bindings, object, end)
}

fn bind_endpoint(bindings: Bindings, endpoint: &TermPattern, term: &Term) -> Option<Bindings> {
    match endpoint {
        TermPattern::Variable(v) => match bindings.get(v) {
            Some(bound) if bound == term => Some(bindings),
            Some(_) => None,
            None => Some(bindings.bind(v.clone(), term.clone())),
        },
        ground => (ground_term(ground).as_ref() == Some(term)).then_some(bindings),
    }
}

fn extend_solutions(
    solutions: &mut Vec<Bindings>,
    subject: &TermPattern,
    object: &TermPattern,
    start: &Term,
    end: &Term,
) {
    if let Some(bindings) = bind_endpoints(subject, object, start, end) {
        solutions.push(bindings);
    }
}

/// Closure forms walk the graph step by step and cannot attribute each hop
/// to a graph binding, so they refuse a variable active graph.
fn require_ground_graph(ctx: &QueryContext) -> EngineResult<()> {
    if matches!(
        ctx.active_graph(),
        spargebra::term::GraphNamePattern::Variable(_)
    ) {
        return Err(EngineError::UnsupportedOperation(
            "recursive property paths under a variable GRAPH".to_owned(),
        ));
    }
    Ok(())
}
