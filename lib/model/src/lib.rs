mod bindings;
pub mod pattern;
pub mod vocab;

pub use bindings::Bindings;
pub use pattern::QuadPattern;

// Re-export some oxiri / oxrdf / spargebra types.
pub use oxiri::Iri;
pub use oxrdf::{
    BlankNode, BlankNodeRef, Dataset, GraphName, GraphNameRef, IriParseError, Literal,
    LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode, Quad, QuadRef, Subject,
    SubjectRef, Term, TermRef, Triple, TripleRef, Variable, VariableNameParseError,
    VariableRef,
};
pub use spargebra::term::{GraphNamePattern, NamedNodePattern, TermPattern, TriplePattern};
