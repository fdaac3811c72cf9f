//! A modular streaming SPARQL query engine over heterogeneous RDF sources.
//!
//! The engine routes every SPARQL-algebra node through an extensible
//! actor/bus/mediator substrate: operator actors stream solution mappings,
//! a cost-mediated join bus pairs them, and source actors resolve quad
//! patterns against in-memory data, SPARQL endpoints, or hypermedia (Triple
//! Pattern Fragments) interfaces.
//!
//! ```no_run
//! use rdf_relay::api::{QueryContext, Source};
//! use rdf_relay::engine::{QueryEngine, QueryResults};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = QueryEngine::default();
//! let ctx = QueryContext::new()
//!     .with_source(Source::iri("https://fragments.dbpedia.org/2016-04/en"));
//! let results = engine
//!     .query("SELECT * WHERE { ?s ?p ?o } LIMIT 10", &ctx)
//!     .await?;
//! if let QueryResults::Solutions(mut stream) = results {
//!     use futures::StreamExt;
//!     while let Some(solution) = stream.next().await {
//!         println!("{:?}", solution?);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api {
    pub use rdf_relay_api::*;
}

pub mod common {
    pub use rdf_relay_common::*;
}

pub mod engine {
    pub use rdf_relay_engine::*;
}

pub mod joins {
    pub use rdf_relay_joins::*;
}

pub mod model {
    pub use rdf_relay_model::*;
}

pub mod operators {
    pub use rdf_relay_operators::*;
}

pub mod paths {
    pub use rdf_relay_paths::*;
}

pub mod sources {
    pub use rdf_relay_sources::*;
}

pub mod streams {
    pub use rdf_relay_streams::*;
}

pub use spargebra::Query;
