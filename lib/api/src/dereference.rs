use crate::QueryContext;
use async_trait::async_trait;
use rdf_relay_common::EngineResult;
use rdf_relay_model::Quad;

/// A dereferenced RDF document: data quads plus the quads describing the
/// document itself (hypermedia controls, dataset statistics).
///
/// Both sets are materialized so a dereference can be cached and re-iterated
/// by later patterns against the same URL; individual pages of a hypermedia
/// interface are bounded in size.
#[derive(Debug, Clone)]
pub struct Dereference {
    /// The final URL after redirects; next-page links resolve against it.
    pub url: String,
    pub media_type: Option<String>,
    pub quads: Vec<Quad>,
    pub metadata: Vec<Quad>,
}

/// The dereference contract consumed by the engine: fetch a URL and parse it
/// into quads, honoring the context's authentication and leniency settings.
#[async_trait]
pub trait Dereferencer: Send + Sync {
    async fn dereference(&self, url: &str, ctx: &QueryContext) -> EngineResult<Dereference>;
}
