use crate::Source;
use oxiri::Iri;
use rdf_relay_model::Bindings;
use spargebra::term::GraphNamePattern;
use std::sync::Arc;
use std::time::Instant;

/// The immutable keyed bag carried through every operation.
///
/// A context is created at query entry and propagated read-only; every
/// `with_*` call produces a new value sharing the rest. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug, Clone)]
struct ContextInner {
    sources: Vec<Source>,
    auth: Option<String>,
    include_credentials: bool,
    base_iri: Option<Iri<String>>,
    lenient: bool,
    initial_bindings: Bindings,
    deadline: Option<Instant>,
    active_graph: GraphNamePattern,
}

impl Default for ContextInner {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            auth: None,
            include_credentials: false,
            base_iri: None,
            lenient: false,
            initial_bindings: Bindings::new(),
            deadline: None,
            active_graph: GraphNamePattern::DefaultGraph,
        }
    }
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, update: impl FnOnce(&mut ContextInner)) -> Self {
        let mut inner = ContextInner::clone(&self.inner);
        update(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    //
    // Sources
    //

    pub fn sources(&self) -> &[Source] {
        &self.inner.sources
    }

    pub fn with_source(&self, source: Source) -> Self {
        self.update(|inner| inner.sources.push(source))
    }

    pub fn with_sources(&self, sources: Vec<Source>) -> Self {
        self.update(|inner| inner.sources = sources)
    }

    /// A sub-context restricted to a single source, used when federating a
    /// pattern over each source in turn.
    pub fn with_single_source(&self, source: Source) -> Self {
        self.update(|inner| inner.sources = vec![source])
    }

    //
    // Authentication
    //

    /// `user:password` credentials for sources that require them.
    pub fn auth(&self) -> Option<&str> {
        self.inner.auth.as_deref()
    }

    pub fn with_auth(&self, auth: impl Into<String>) -> Self {
        self.update(|inner| inner.auth = Some(auth.into()))
    }

    pub fn include_credentials(&self) -> bool {
        self.inner.include_credentials
    }

    pub fn with_include_credentials(&self, include: bool) -> Self {
        self.update(|inner| inner.include_credentials = include)
    }

    //
    // Query shape
    //

    pub fn base_iri(&self) -> Option<&Iri<String>> {
        self.inner.base_iri.as_ref()
    }

    pub fn with_base_iri(&self, base_iri: Iri<String>) -> Self {
        self.update(|inner| inner.base_iri = Some(base_iri))
    }

    /// Whether malformed quads from sources are skipped instead of failing
    /// the stream.
    pub fn lenient(&self) -> bool {
        self.inner.lenient
    }

    pub fn with_lenient(&self, lenient: bool) -> Self {
        self.update(|inner| inner.lenient = lenient)
    }

    /// Bindings seeded into every solution: substituted into quad patterns
    /// before resolution and merged into the results at the root.
    pub fn initial_bindings(&self) -> &Bindings {
        &self.inner.initial_bindings
    }

    pub fn with_initial_bindings(&self, bindings: Bindings) -> Self {
        self.update(|inner| inner.initial_bindings = bindings)
    }

    //
    // Evaluation state
    //

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.update(|inner| inner.deadline = Some(deadline))
    }

    /// The graph position used when resolving quad patterns; set by the
    /// `GRAPH` operator, default graph otherwise.
    pub fn active_graph(&self) -> &GraphNamePattern {
        &self.inner.active_graph
    }

    pub fn with_active_graph(&self, graph: GraphNamePattern) -> Self {
        self.update(|inner| inner.active_graph = graph)
    }

    /// Right-biased merge: values set on `other` replace values on `self`.
    pub fn merged_with(&self, other: &QueryContext) -> Self {
        self.update(|inner| {
            let right = &other.inner;
            if !right.sources.is_empty() {
                inner.sources = right.sources.clone();
            }
            if right.auth.is_some() {
                inner.auth = right.auth.clone();
            }
            inner.include_credentials |= right.include_credentials;
            if right.base_iri.is_some() {
                inner.base_iri = right.base_iri.clone();
            }
            inner.lenient |= right.lenient;
            if !right.initial_bindings.is_empty() {
                inner.initial_bindings = right.initial_bindings.clone();
            }
            if right.deadline.is_some() {
                inner.deadline = right.deadline;
            }
            if right.active_graph != GraphNamePattern::DefaultGraph {
                inner.active_graph = right.active_graph.clone();
            }
        })
    }
}
