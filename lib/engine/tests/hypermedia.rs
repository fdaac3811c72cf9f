use async_trait::async_trait;
use futures::StreamExt;
use rdf_relay_api::{Dereference, Dereferencer, QueryContext, Source};
use rdf_relay_common::{Cardinality, EngineError, EngineResult};
use rdf_relay_engine::{EngineConfig, QueryEngine, QueryResults};
use rdf_relay_model::vocab::{hydra, rdf, void};
use rdf_relay_model::{BlankNode, GraphName, Literal, NamedNode, Quad};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const ROOT: &str = "http://t.example/data";
// The search form instantiated for pattern `?s <http://ex/p> ?o`.
const PAGE_1: &str = "http://t.example/data?p=http%3A%2F%2Fex%2Fp";
const PAGE_2: &str = "http://t.example/data?p=http%3A%2F%2Fex%2Fp&page=2";

fn iri(value: &str) -> NamedNode {
    NamedNode::new_unchecked(value)
}

fn data_quad(s: &str, o: &str) -> Quad {
    Quad::new(
        iri(&format!("http://ex/{s}")),
        iri("http://ex/p"),
        iri(&format!("http://ex/{o}")),
        GraphName::DefaultGraph,
    )
}

/// The controls of a TPF root document: a search form over s/p/o.
fn search_form_metadata(page: &str) -> Vec<Quad> {
    let form = BlankNode::new_unchecked("form");
    let mut quads = vec![
        Quad::new(
            iri(page),
            hydra::SEARCH.into_owned(),
            form.clone(),
            GraphName::DefaultGraph,
        ),
        Quad::new(
            form.clone(),
            hydra::TEMPLATE.into_owned(),
            Literal::new_simple_literal(format!("{ROOT}{{?s,p,o}}")),
            GraphName::DefaultGraph,
        ),
    ];
    for (label, position) in [
        ("s", rdf::SUBJECT),
        ("p", rdf::PREDICATE),
        ("o", rdf::OBJECT),
    ] {
        let mapping = BlankNode::new_unchecked(format!("m{label}"));
        quads.push(Quad::new(
            form.clone(),
            hydra::MAPPING.into_owned(),
            mapping.clone(),
            GraphName::DefaultGraph,
        ));
        quads.push(Quad::new(
            mapping.clone(),
            hydra::VARIABLE.into_owned(),
            Literal::new_simple_literal(label),
            GraphName::DefaultGraph,
        ));
        quads.push(Quad::new(
            mapping,
            hydra::PROPERTY.into_owned(),
            position.into_owned(),
            GraphName::DefaultGraph,
        ));
    }
    quads
}

fn page_metadata(page: &str, total: u64, next: Option<&str>) -> Vec<Quad> {
    let mut quads = vec![Quad::new(
        iri(page),
        void::TRIPLES.into_owned(),
        Literal::from(total as i64),
        GraphName::DefaultGraph,
    )];
    if let Some(next) = next {
        quads.push(Quad::new(
            iri(page),
            hydra::NEXT.into_owned(),
            iri(next),
            GraphName::DefaultGraph,
        ));
    }
    quads
}

/// A fake network: URL -> document, counting dereferences.
struct FakeWeb {
    documents: HashMap<String, Dereference>,
    calls: AtomicUsize,
}

impl FakeWeb {
    fn tpf(page2_present: bool) -> Self {
        let mut documents = HashMap::new();
        documents.insert(
            ROOT.to_owned(),
            Dereference {
                url: ROOT.to_owned(),
                media_type: None,
                quads: Vec::new(),
                metadata: search_form_metadata(ROOT),
            },
        );
        documents.insert(
            PAGE_1.to_owned(),
            Dereference {
                url: PAGE_1.to_owned(),
                media_type: None,
                quads: vec![data_quad("a", "b"), data_quad("b", "c")],
                metadata: [
                    search_form_metadata(PAGE_1),
                    page_metadata(PAGE_1, 3, Some(PAGE_2)),
                ]
                .concat(),
            },
        );
        if page2_present {
            documents.insert(
                PAGE_2.to_owned(),
                Dereference {
                    url: PAGE_2.to_owned(),
                    media_type: None,
                    quads: vec![data_quad("c", "d")],
                    metadata: page_metadata(PAGE_2, 3, None),
                },
            );
        }
        Self {
            documents,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Dereferencer for FakeWeb {
    async fn dereference(&self, url: &str, _ctx: &QueryContext) -> EngineResult<Dereference> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| EngineError::source(url, "no such document"))
    }
}

fn engine_over(web: Arc<FakeWeb>) -> QueryEngine {
    QueryEngine::new(EngineConfig {
        dereferencer: Some(web),
        ..EngineConfig::default()
    })
}

fn tpf_ctx() -> QueryContext {
    QueryContext::new().with_source(Source::hypermedia(ROOT))
}

#[tokio::test]
async fn pages_are_followed_and_concatenated() {
    let web = Arc::new(FakeWeb::tpf(true));
    let engine = engine_over(Arc::clone(&web));
    let QueryResults::Solutions(stream) = engine
        .query("SELECT * WHERE { ?s <http://ex/p> ?o }", &tpf_ctx())
        .await
        .expect("query evaluates")
    else {
        panic!("expected solutions");
    };
    assert_eq!(stream.cardinality(), Cardinality::Estimate(3));
    let out: Vec<_> = stream
        .map(|solution| solution.expect("no stream errors"))
        .collect()
        .await;
    assert_eq!(out.len(), 3);
}

#[tokio::test]
async fn a_failing_page_surfaces_as_a_stream_error_after_delivered_results() {
    let web = Arc::new(FakeWeb::tpf(false));
    let engine = engine_over(web);
    let QueryResults::Solutions(stream) = engine
        .query("SELECT * WHERE { ?s <http://ex/p> ?o }", &tpf_ctx())
        .await
        .expect("first page resolves")
    else {
        panic!("expected solutions");
    };
    let out: Vec<_> = stream.collect().await;
    // Page 1 results stand, the missing page 2 is exactly one error, and the
    // stream terminates.
    assert_eq!(out.iter().filter(|r| r.is_ok()).count(), 2);
    assert_eq!(out.iter().filter(|r| r.is_err()).count(), 1);
}

#[tokio::test]
async fn the_dereference_cache_deduplicates_fetches() {
    let web = Arc::new(FakeWeb::tpf(true));
    let engine = engine_over(Arc::clone(&web));
    for _ in 0..2 {
        let QueryResults::Solutions(stream) = engine
            .query("SELECT * WHERE { ?s <http://ex/p> ?o }", &tpf_ctx())
            .await
            .expect("query evaluates")
        else {
            panic!("expected solutions");
        };
        let _: Vec<_> = stream.collect().await;
    }
    // Root + page 1 + page 2, each fetched once despite two runs.
    assert_eq!(web.calls.load(Ordering::SeqCst), 3);

    engine.invalidate_all_cached();
    let QueryResults::Solutions(stream) = engine
        .query("SELECT * WHERE { ?s <http://ex/p> ?o }", &tpf_ctx())
        .await
        .expect("query evaluates")
    else {
        panic!("expected solutions");
    };
    let _: Vec<_> = stream.collect().await;
    assert_eq!(web.calls.load(Ordering::SeqCst), 6);
}
