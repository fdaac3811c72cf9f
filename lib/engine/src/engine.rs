use crate::eval::evaluate_query;
use crate::results::QueryResults;
use rdf_relay_api::{
    Bus, Dereferencer, EngineView, Fetcher, MediationPolicy, Mediator, QueryContext,
};
use rdf_relay_common::EngineResult;
use rdf_relay_sources::{DereferenceCache, HttpDereferencer, ReqwestFetcher};
use spargebra::Query;
use std::sync::Arc;

/// Configuration of an engine instance. The transport contracts can be
/// replaced, which is how tests substitute fake networks.
pub struct EngineConfig {
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub dereferencer: Option<Arc<dyn Dereferencer>>,
    /// Capacity of the dereference cache, in documents.
    pub cache_capacity: usize,
    /// Context merged under every query's context.
    pub base_context: QueryContext,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetcher: None,
            dereferencer: None,
            cache_capacity: 256,
            base_context: QueryContext::new(),
        }
    }
}

/// A wired engine instance.
///
/// Construction subscribes every default actor to its bus and freezes the
/// wiring; buses and mediators are read-only afterwards, so queries share
/// them without locking. Dropping the engine drops the buses, the actors and
/// the dereference cache.
pub struct QueryEngine {
    view: EngineView,
    cache: Arc<DereferenceCache>,
    base_context: QueryContext,
}

impl QueryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = config
            .fetcher
            .unwrap_or_else(|| Arc::new(ReqwestFetcher::new()));
        let dereferencer = config
            .dereferencer
            .unwrap_or_else(|| Arc::new(HttpDereferencer::new(Arc::clone(&fetcher))));
        let cache = Arc::new(DereferenceCache::new(config.cache_capacity));

        let mut operations = Bus::new("query-operation");
        for actor in rdf_relay_operators::default_actors() {
            operations.subscribe(actor);
        }
        let mut patterns = Bus::new("quad-pattern");
        for actor in rdf_relay_sources::default_actors(Arc::clone(&cache)) {
            patterns.subscribe(actor);
        }
        let mut joins = Bus::new("join");
        for actor in rdf_relay_joins::default_actors() {
            joins.subscribe(actor);
        }

        let view = EngineView {
            query_operations: Arc::new(Mediator::new(
                Arc::new(operations),
                MediationPolicy::First,
            )),
            quad_patterns: Arc::new(Mediator::new(
                Arc::new(patterns),
                MediationPolicy::First,
            )),
            joins: Arc::new(Mediator::new(
                Arc::new(joins),
                MediationPolicy::MinimumIterations,
            )),
            fetcher,
            dereferencer,
        };
        Self {
            view,
            cache,
            base_context: config.base_context,
        }
    }

    /// The engine's wiring, for callers that drive buses directly.
    pub fn view(&self) -> &EngineView {
        &self.view
    }

    /// Parses and evaluates a SPARQL query. Parsing is the collaborator
    /// `spargebra`; evaluation starts at the query-operation mediator.
    pub async fn query(
        &self,
        query: &str,
        ctx: &QueryContext,
    ) -> EngineResult<QueryResults> {
        let ctx = self.base_context.merged_with(ctx);
        let base_iri = ctx.base_iri().map(|iri| iri.as_str().to_owned());
        let query = Query::parse(query, base_iri.as_deref())?;
        self.query_parsed(query, &ctx).await
    }

    /// Evaluates an already parsed query (an algebra tree).
    pub async fn query_parsed(
        &self,
        query: Query,
        ctx: &QueryContext,
    ) -> EngineResult<QueryResults> {
        evaluate_query(&self.view, query, ctx).await
    }

    /// The HTTP-invalidate surface of the dereference cache.
    pub fn invalidate_cached(&self, url: &str) {
        self.cache.invalidate(url);
    }

    pub fn invalidate_all_cached(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
