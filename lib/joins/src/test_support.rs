use async_trait::async_trait;
use rdf_relay_api::{
    Bus, Dereference, Dereferencer, EngineView, FetchRequest, FetchResponse, Fetcher,
    MediationPolicy, Mediator, QueryContext,
};
use rdf_relay_common::{EngineError, EngineResult};
use std::sync::Arc;

struct NoTransport;

#[async_trait]
impl Fetcher for NoTransport {
    async fn fetch(&self, request: FetchRequest) -> EngineResult<FetchResponse> {
        Err(EngineError::source(request.url, "no transport in tests"))
    }
}

#[async_trait]
impl Dereferencer for NoTransport {
    async fn dereference(&self, url: &str, _ctx: &QueryContext) -> EngineResult<Dereference> {
        Err(EngineError::source(url, "no transport in tests"))
    }
}

/// A view whose join bus carries the default join actors and whose other
/// buses are empty. Enough for exercising join actors directly.
pub(crate) fn dummy_view() -> EngineView {
    let mut join_bus = Bus::new("join");
    for actor in crate::default_actors() {
        join_bus.subscribe(actor);
    }
    EngineView {
        query_operations: Arc::new(Mediator::new(
            Arc::new(Bus::new("query-operation")),
            MediationPolicy::First,
        )),
        quad_patterns: Arc::new(Mediator::new(
            Arc::new(Bus::new("quad-pattern")),
            MediationPolicy::First,
        )),
        joins: Arc::new(Mediator::new(
            Arc::new(join_bus),
            MediationPolicy::MinimumIterations,
        )),
        fetcher: Arc::new(NoTransport),
        dereferencer: Arc::new(NoTransport),
    }
}
