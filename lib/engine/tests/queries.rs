use futures::StreamExt;
use rdf_relay_api::{QueryContext, Source};
use rdf_relay_common::Cardinality;
use rdf_relay_engine::{EngineConfig, QueryEngine, QueryResults};
use rdf_relay_model::{GraphName, NamedNode, Quad, Term, Variable};
use rdf_relay_sources::DatasetSource;
use sparesults::QuerySolution;
use spargebra::algebra::GraphPattern;
use spargebra::Query;
use std::time::Instant;

fn iri(value: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://ex/{value}"))
}

fn quad(s: &str, p: &str, o: &str) -> Quad {
    Quad::new(iri(s), iri(p), iri(o), GraphName::DefaultGraph)
}

fn ctx_over(quads: impl IntoIterator<Item = Quad>) -> QueryContext {
    QueryContext::new().with_source(Source::memory(DatasetSource::from_quads(quads)))
}

async fn solutions(engine: &QueryEngine, query: &str, ctx: &QueryContext) -> (Vec<QuerySolution>, Vec<Variable>, Cardinality) {
    let QueryResults::Solutions(stream) = engine
        .query(query, ctx)
        .await
        .expect("query evaluates")
    else {
        panic!("expected solutions");
    };
    let variables = stream.variables().to_vec();
    let cardinality = stream.cardinality();
    let out: Vec<_> = stream
        .map(|solution| solution.expect("no stream errors"))
        .collect()
        .await;
    (out, variables, cardinality)
}

#[tokio::test]
async fn pattern_over_memory_source() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([
        quad("a", "p", "b"),
        quad("b", "p", "c"),
        quad("c", "p", "d"),
        quad("a", "q", "d"),
    ]);
    let (out, variables, cardinality) =
        solutions(&engine, "SELECT * WHERE { ?s <http://ex/p> ?o }", &ctx).await;
    assert_eq!(
        variables,
        vec![Variable::new_unchecked("s"), Variable::new_unchecked("o")]
    );
    assert_eq!(out.len(), 3);
    assert_eq!(cardinality, Cardinality::Exact(3));
}

#[tokio::test]
async fn join_output_is_independent_of_entry_order() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([
        quad("s1", "a", "x1"),
        quad("x1", "b", "s1"),
        quad("s2", "a", "x2"),
        quad("x2", "b", "s2"),
        quad("s3", "a", "x3"),
    ]);
    let mut outputs = Vec::new();
    for query in [
        "SELECT ?s WHERE { ?s <http://ex/a> ?x . ?x <http://ex/b> ?s }",
        "SELECT ?s WHERE { ?x <http://ex/b> ?s . ?s <http://ex/a> ?x }",
    ] {
        let (out, _, _) = solutions(&engine, query, &ctx).await;
        let mut subjects: Vec<Term> = out
            .iter()
            .map(|solution| solution.get("s").expect("s bound").clone())
            .collect();
        subjects.sort_by_key(|term| term.to_string());
        outputs.push(subjects);
    }
    assert_eq!(outputs[0], vec![Term::from(iri("s1")), Term::from(iri("s2"))]);
    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn sequence_path_hides_the_generated_intermediate() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("S", "a", "M"), quad("M", "b", "O")]);
    let (out, variables, _) = solutions(
        &engine,
        "SELECT * WHERE { <http://ex/S> <http://ex/a>/<http://ex/b> <http://ex/O> }",
        &ctx,
    )
    .await;
    assert_eq!(out.len(), 1);
    assert!(variables.iter().all(|v| !v.as_str().starts_with("__path_")));
    assert!(variables.is_empty());
}

#[tokio::test]
async fn kleene_star_terminates_and_deduplicates_on_cycles() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("alice", "knows", "bob"), quad("bob", "knows", "alice")]);
    let (out, _, _) = solutions(
        &engine,
        "SELECT ?o WHERE { <http://ex/alice> <http://ex/knows>* ?o }",
        &ctx,
    )
    .await;
    let mut reached: Vec<String> = out
        .iter()
        .map(|solution| solution.get("o").expect("o bound").to_string())
        .collect();
    reached.sort();
    assert_eq!(reached, vec!["<http://ex/alice>", "<http://ex/bob>"]);
}

#[tokio::test]
async fn zero_or_more_always_contains_the_identity() {
    let engine = QueryEngine::default();
    // No knows-edges at all: alice still reaches herself in zero steps.
    let ctx = ctx_over([quad("alice", "likes", "bob")]);
    let result = engine
        .query(
            "ASK { <http://ex/alice> <http://ex/knows>* <http://ex/alice> }",
            &ctx,
        )
        .await
        .expect("query evaluates");
    assert!(matches!(result, QueryResults::Boolean(true)));
}

#[tokio::test]
async fn slice_emits_the_requested_window_in_order() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([
        quad("s1", "p", "o"),
        quad("s2", "p", "o"),
        quad("s3", "p", "o"),
        quad("s4", "p", "o"),
    ]);
    let (out, _, cardinality) = solutions(
        &engine,
        "SELECT ?s WHERE { ?s <http://ex/p> <http://ex/o> } ORDER BY ?s LIMIT 2 OFFSET 1",
        &ctx,
    )
    .await;
    let subjects: Vec<String> = out
        .iter()
        .map(|solution| solution.get("s").expect("s bound").to_string())
        .collect();
    assert_eq!(subjects, vec!["<http://ex/s2>", "<http://ex/s3>"]);
    assert_eq!(cardinality, Cardinality::Exact(2));
}

#[tokio::test]
async fn distinct_is_idempotent() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("a", "p", "b"), quad("a", "q", "b")]);
    // Two patterns that both bind ?s to the same term produce duplicates.
    let base = "WHERE { ?s ?p <http://ex/b> }";
    let (plain, _, _) = solutions(&engine, &format!("SELECT ?s {base}"), &ctx).await;
    assert_eq!(plain.len(), 2);
    let (once, _, _) = solutions(&engine, &format!("SELECT DISTINCT ?s {base}"), &ctx).await;
    assert_eq!(once.len(), 1);

    // distinct(distinct(X)) == distinct(X), built as an explicit tree since
    // the surface syntax cannot nest DISTINCT.
    let parsed = Query::parse(&format!("SELECT DISTINCT ?s {base}"), None).expect("parses");
    let Query::Select {
        dataset,
        pattern,
        base_iri,
    } = parsed
    else {
        panic!("expected a select");
    };
    let doubled = Query::Select {
        dataset,
        pattern: GraphPattern::Distinct {
            inner: Box::new(pattern),
        },
        base_iri,
    };
    let QueryResults::Solutions(stream) = engine
        .query_parsed(doubled, &ctx)
        .await
        .expect("query evaluates")
    else {
        panic!("expected solutions");
    };
    let twice: Vec<_> = stream
        .map(|solution| solution.expect("no stream errors"))
        .collect()
        .await;
    assert_eq!(once.len(), twice.len());
}

#[tokio::test]
async fn filter_drops_on_false_and_on_evaluation_error() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("a", "p", "b"), quad("b", "p", "c")]);
    // STRLEN of an IRI is an evaluation error, which filters treat as false.
    let (out, _, _) = solutions(
        &engine,
        "SELECT ?s WHERE { ?s <http://ex/p> ?o FILTER(?o = <http://ex/b> || STRLEN(?o) > 0) }",
        &ctx,
    )
    .await;
    assert_eq!(out.len(), 1);
}

#[tokio::test]
async fn optional_keeps_unmatched_left_solutions() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([
        quad("a", "p", "b"),
        quad("c", "p", "d"),
        quad("b", "label", "l1"),
    ]);
    let (out, _, _) = solutions(
        &engine,
        "SELECT ?o ?l WHERE { ?s <http://ex/p> ?o OPTIONAL { ?o <http://ex/label> ?l } }",
        &ctx,
    )
    .await;
    assert_eq!(out.len(), 2);
    let bound: Vec<bool> = out.iter().map(|s| s.get("l").is_some()).collect();
    assert!(bound.contains(&true) && bound.contains(&false));
}

#[tokio::test]
async fn initial_bindings_restrict_and_survive_to_the_output() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("a", "p", "b"), quad("c", "p", "d")])
        .with_initial_bindings(
            [(Variable::new_unchecked("s"), Term::from(iri("a")))]
                .into_iter()
                .collect(),
        );
    let (out, _, _) = solutions(&engine, "SELECT * WHERE { ?s <http://ex/p> ?o }", &ctx).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].get("s"), Some(&Term::from(iri("a"))));
}

#[tokio::test]
async fn a_passed_deadline_cancels_with_a_distinct_error() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("a", "p", "b")]).with_deadline(Instant::now());
    let QueryResults::Solutions(stream) = engine
        .query("SELECT * WHERE { ?s <http://ex/p> ?o }", &ctx)
        .await
        .expect("query resolves")
    else {
        panic!("expected solutions");
    };
    let out: Vec<_> = stream.collect().await;
    assert_eq!(out.len(), 1);
    assert!(out[0]
        .as_ref()
        .is_err_and(rdf_relay_common::EngineError::is_cancellation));
}

#[tokio::test]
async fn construct_instantiates_its_template() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([quad("a", "p", "b")]);
    let result = engine
        .query(
            "CONSTRUCT { ?s <http://ex/derived> ?o } WHERE { ?s <http://ex/p> ?o }",
            &ctx,
        )
        .await
        .expect("query evaluates");
    let QueryResults::Graph(stream) = result else {
        panic!("expected a graph");
    };
    let triples: Vec<_> = stream.map(|t| t.expect("no stream errors")).collect().await;
    assert_eq!(triples.len(), 1);
    assert_eq!(triples[0].predicate, iri("derived"));
}

#[tokio::test]
async fn group_aggregates_count_per_key() {
    let engine = QueryEngine::default();
    let ctx = ctx_over([
        quad("a", "p", "x"),
        quad("a", "p", "y"),
        quad("b", "p", "z"),
    ]);
    let (out, _, _) = solutions(
        &engine,
        "SELECT ?s (COUNT(?o) AS ?n) WHERE { ?s <http://ex/p> ?o } GROUP BY ?s ORDER BY ?s",
        &ctx,
    )
    .await;
    assert_eq!(out.len(), 2);
    let n_for = |key: &NamedNode| {
        out.iter()
            .find(|s| s.get("s") == Some(&Term::from(key.clone())))
            .and_then(|s| s.get("n"))
            .map(ToString::to_string)
    };
    assert_eq!(
        n_for(&iri("a")).expect("group a"),
        "\"2\"^^<http://www.w3.org/2001/XMLSchema#integer>"
    );
    assert_eq!(
        n_for(&iri("b")).expect("group b"),
        "\"1\"^^<http://www.w3.org/2001/XMLSchema#integer>"
    );
}

#[tokio::test]
async fn multiple_sources_federate_per_pattern() {
    let engine = QueryEngine::default();
    let ctx = QueryContext::new()
        .with_source(Source::memory(DatasetSource::from_quads([quad(
            "a", "p", "b",
        )])))
        .with_source(Source::memory(DatasetSource::from_quads([quad(
            "c", "p", "d",
        )])));
    let (out, _, cardinality) =
        solutions(&engine, "SELECT * WHERE { ?s <http://ex/p> ?o }", &ctx).await;
    assert_eq!(out.len(), 2);
    assert_eq!(cardinality, Cardinality::Exact(2));
}

#[tokio::test]
async fn metadata_upper_bounds_delivery_on_exact_backends() {
    let engine = QueryEngine::new(EngineConfig::default());
    let ctx = ctx_over([
        quad("a", "p", "b"),
        quad("b", "p", "c"),
        quad("a", "q", "d"),
    ]);
    for query in [
        "SELECT * WHERE { ?s <http://ex/p> ?o }",
        "SELECT * WHERE { ?s ?p ?o }",
        "SELECT DISTINCT ?s WHERE { ?s ?p ?o }",
    ] {
        let (out, _, cardinality) = solutions(&engine, query, &ctx).await;
        assert!(
            cardinality.cost_key() >= out.len() as u64,
            "{query}: {cardinality} < {}",
            out.len()
        );
    }
}
