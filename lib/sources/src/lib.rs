mod cache;
mod dereference;
mod federated;
mod fetcher;
mod hypermedia;
mod memory;
mod sparql_endpoint;

pub use cache::DereferenceCache;
pub use dereference::HttpDereferencer;
pub use federated::FederatedSourceActor;
pub use fetcher::ReqwestFetcher;
pub use hypermedia::HypermediaSourceActor;
pub use memory::{DatasetSource, MemorySourceActor};
pub use sparql_endpoint::SparqlEndpointActor;

use rdf_relay_api::{Actor, QuadPatternAction};
use std::sync::Arc;

/// The quad-pattern actors in subscription order. Exactly one passes per
/// action: federation for multi-source contexts, then one actor per source
/// family.
pub fn default_actors(
    cache: Arc<DereferenceCache>,
) -> Vec<Arc<dyn Actor<QuadPatternAction>>> {
    vec![
        Arc::new(FederatedSourceActor),
        Arc::new(MemorySourceActor),
        Arc::new(SparqlEndpointActor),
        Arc::new(HypermediaSourceActor::new(cache)),
    ]
}
