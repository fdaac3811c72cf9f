use crate::results::{QueryResults, QuerySolutionStream, QueryTripleStream};
use futures::{StreamExt, TryStreamExt};
use rdf_relay_api::{EngineView, QueryContext, ResolvedBindings};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{QuadPattern, Term, Triple, Variable};
use rdf_relay_streams::{BindingsStreamAdapter, DeadlineStream};
use rustc_hash::FxHashSet;
use spargebra::algebra::GraphPattern;
use spargebra::term::{GraphNamePattern, TermPattern};
use spargebra::Query;

/// Evaluates a parsed query against the engine wiring: the root algebra node
/// is mediated to the query-operation bus and the result shaped per query
/// form.
pub(crate) async fn evaluate_query(
    view: &EngineView,
    query: Query,
    ctx: &QueryContext,
) -> EngineResult<QueryResults> {
    match query {
        Query::Select { pattern, .. } => {
            let resolved = evaluate_root(view, pattern, ctx).await?;
            Ok(QueryResults::Solutions(QuerySolutionStream::new(resolved)))
        }
        Query::Ask { pattern, .. } => {
            let resolved = evaluate_root(view, pattern, ctx).await?;
            let mut stream = resolved.stream;
            match stream.next().await {
                Some(Ok(_)) => Ok(QueryResults::Boolean(true)),
                Some(Err(e)) => Err(e),
                None => Ok(QueryResults::Boolean(false)),
            }
        }
        Query::Construct {
            template, pattern, ..
        } => {
            let resolved = evaluate_root(view, pattern, ctx).await?;
            Ok(QueryResults::Graph(QueryTripleStream::from_template(
                template, resolved,
            )))
        }
        Query::Describe { pattern, .. } => describe(view, pattern, ctx).await,
    }
}

/// Evaluates the root pattern, merges the context's initial bindings into
/// every solution, and arms the deadline, when one is set.
async fn evaluate_root(
    view: &EngineView,
    pattern: GraphPattern,
    ctx: &QueryContext,
) -> EngineResult<ResolvedBindings> {
    let resolved = view.evaluate_operation(pattern, ctx).await?;

    let resolved = if ctx.initial_bindings().is_empty() {
        resolved
    } else {
        let initial = ctx.initial_bindings().clone();
        let mut variables: Vec<Variable> = resolved.variables().to_vec();
        for variable in initial.variables() {
            if !variables.contains(variable) {
                variables.push(variable.clone());
            }
        }
        let cardinality = resolved.cardinality;
        let stream = resolved
            .stream
            .try_filter_map(move |bindings| futures::future::ok(initial.merge_with(&bindings)));
        ResolvedBindings::new(
            BindingsStreamAdapter::sendable(variables.into(), Box::pin(stream)),
            cardinality,
        )
    };

    Ok(match ctx.deadline() {
        Some(deadline) => ResolvedBindings::new(
            Box::pin(DeadlineStream::new(resolved.stream, deadline)),
            resolved.cardinality,
        ),
        None => resolved,
    })
}

/// `DESCRIBE`: evaluate the pattern, then expand every named node bound in
/// the solutions through an `<resource> ?p ?o` scan.
async fn describe(
    view: &EngineView,
    pattern: GraphPattern,
    ctx: &QueryContext,
) -> EngineResult<QueryResults> {
    let resolved = evaluate_root(view, pattern, ctx).await?;
    let solutions: Vec<_> = resolved.stream.try_collect().await?;

    let mut resources = Vec::new();
    let mut seen = FxHashSet::default();
    for bindings in &solutions {
        for (_, term) in bindings.iter() {
            if let Term::NamedNode(resource) = term {
                if seen.insert(resource.clone()) {
                    resources.push(resource.clone());
                }
            }
        }
    }

    let mut triples = Vec::new();
    for resource in resources {
        let scan = QuadPattern::new(
            TermPattern::NamedNode(resource),
            rdf_relay_model::NamedNodePattern::Variable(Variable::new_unchecked("p")),
            TermPattern::Variable(Variable::new_unchecked("o")),
            GraphNamePattern::DefaultGraph,
        );
        let resolved = view
            .quad_patterns
            .mediate(rdf_relay_api::QuadPatternAction::new(scan), ctx, view)
            .await?;
        let quads: Vec<_> = resolved.stream.try_collect().await?;
        triples.extend(quads.into_iter().map(|quad| {
            Triple::new(quad.subject, quad.predicate, quad.object)
        }));
    }
    Ok(QueryResults::Graph(QueryTripleStream::from_triples(triples)))
}
