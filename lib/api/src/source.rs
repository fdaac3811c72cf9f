use rdf_relay_model::{Quad, QuadPattern};
use std::fmt;
use std::sync::Arc;

/// Describes where quads come from.
#[derive(Clone)]
pub enum Source {
    /// A dereferenceable IRI; `kind` selects the resolver family.
    Iri { value: String, kind: SourceKind },
    /// An in-memory source exposing pattern matching.
    Memory(Arc<dyn MemoryQuadSource>),
}

/// The resolver family of an IRI source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Detect from the document: hypermedia-driven dereference.
    Auto,
    /// A Triple/Quad Pattern Fragments interface.
    Hypermedia,
    /// A SPARQL protocol endpoint.
    Sparql,
    /// A local file, dereferenced through a `file://` URL.
    File,
}

impl Source {
    pub fn iri(value: impl Into<String>) -> Self {
        Self::Iri {
            value: value.into(),
            kind: SourceKind::Auto,
        }
    }

    pub fn sparql(endpoint: impl Into<String>) -> Self {
        Self::Iri {
            value: endpoint.into(),
            kind: SourceKind::Sparql,
        }
    }

    pub fn hypermedia(url: impl Into<String>) -> Self {
        Self::Iri {
            value: url.into(),
            kind: SourceKind::Hypermedia,
        }
    }

    pub fn file(path: impl AsRef<str>) -> Self {
        Self::Iri {
            value: format!("file://{}", path.as_ref()),
            kind: SourceKind::File,
        }
    }

    pub fn memory(source: impl MemoryQuadSource + 'static) -> Self {
        Self::Memory(Arc::new(source))
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri { value, kind } => write!(f, "Iri({value}, {kind:?})"),
            Self::Memory(_) => write!(f, "Memory(..)"),
        }
    }
}

/// An in-memory quad source.
///
/// `match_pattern` returns every quad matching the pattern's ground
/// positions; binding consistency for repeated variables is re-checked by the
/// caller through [`QuadPattern::match_quad`], so implementations may
/// over-approximate.
pub trait MemoryQuadSource: Send + Sync {
    fn match_pattern(&self, pattern: &QuadPattern) -> Vec<Quad>;
}
