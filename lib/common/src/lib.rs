pub mod error;

mod cardinality;

pub use cardinality::Cardinality;
pub use error::EngineError;

/// Result type used throughout the rdf-relay crates.
pub type EngineResult<T> = Result<T, EngineError>;
