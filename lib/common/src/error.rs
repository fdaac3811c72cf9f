use std::convert::Infallible;
use std::error::Error;
use std::io;

/// An error raised while wiring or evaluating a query.
///
/// The variants follow the failure taxonomy of the engine: dispatch failures,
/// source failures, collaborator (parsing) failures, cancellation, and
/// invariant violations. Expression type errors are *not* represented here;
/// per SPARQL semantics they are absorbed by the operator that evaluated the
/// expression (filters drop the solution, extends leave the variable unbound).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// No actor on the named bus passed its `test` for the given action.
    #[error("no actor on bus '{bus}' could handle an action of type '{kind}'")]
    NoActorFor { bus: &'static str, kind: String },
    /// A source could not be dereferenced or answered with an error.
    #[error("failed to access source {url}: {source}")]
    Source {
        url: String,
        #[source]
        source: Box<dyn Error + Send + Sync + 'static>,
    },
    /// An error in SPARQL parsing.
    #[error(transparent)]
    Parsing(#[from] spargebra::SparqlSyntaxError),
    /// An error while parsing a result file returned by a remote endpoint.
    #[error(transparent)]
    ResultsParsing(#[from] sparesults::QueryResultsParseError),
    /// An error returned during results serialization.
    #[error(transparent)]
    ResultsSerialization(#[from] io::Error),
    /// The engine does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// The variable encoding the service name is unbound.
    #[error("the variable encoding the service name is unbound")]
    UnboundService,
    /// The given `SERVICE` target is not a named node.
    #[error("{0} is not a valid service name")]
    InvalidServiceName(oxrdf::Term),
    /// The query was cancelled, either explicitly or by a deadline.
    ///
    /// Kept distinct from other failures so that downstream consumers can
    /// tell cancellation apart from exhaustion or source errors.
    #[error("the query was cancelled: {0}")]
    Cancelled(String),
    /// A programmer error, e.g. a generated variable colliding with a user
    /// variable. Surfaces at the root and is never retried.
    #[error("invariant violation: {0}")]
    Invariant(String),
    /// An internal error that likely indicates a bug in rdf-relay.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Builds a [`EngineError::Source`] from a printable cause.
    pub fn source(
        url: impl Into<String>,
        cause: impl Into<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::Source {
            url: url.into(),
            source: cause.into(),
        }
    }

    /// Builds a [`EngineError::Internal`] wrapped in `Err`.
    pub fn internal<T>(cause: impl Into<String>) -> Result<T, Self> {
        Err(Self::Internal(cause.into()))
    }

    /// Builds a [`EngineError::Invariant`] wrapped in `Err`.
    pub fn invariant<T>(cause: impl Into<String>) -> Result<T, Self> {
        Err(Self::Invariant(cause.into()))
    }

    /// Returns whether this error denotes cancellation rather than failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<Infallible> for EngineError {
    #[inline]
    fn from(error: Infallible) -> Self {
        match error {}
    }
}
