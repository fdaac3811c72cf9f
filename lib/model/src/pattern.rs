use crate::Bindings;
use oxrdf::{GraphName, Quad, Term, Variable};
use spargebra::term::{GraphNamePattern, NamedNodePattern, TermPattern, TriplePattern};
use std::fmt;

/// A quad where each position may be a variable.
///
/// Patterns reach the quad-pattern bus in this shape. Query blank nodes have
/// been rewritten to variables by the BGP operator before that; a blank node
/// in a pattern position is a ground reference to a previously matched node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuadPattern {
    pub subject: TermPattern,
    pub predicate: NamedNodePattern,
    pub object: TermPattern,
    pub graph: GraphNamePattern,
}

impl QuadPattern {
    pub fn new(
        subject: impl Into<TermPattern>,
        predicate: impl Into<NamedNodePattern>,
        object: impl Into<TermPattern>,
        graph: GraphNamePattern,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            graph,
        }
    }

    pub fn from_triple(triple: &TriplePattern, graph: &GraphNamePattern) -> Self {
        Self {
            subject: triple.subject.clone(),
            predicate: triple.predicate.clone(),
            object: triple.object.clone(),
            graph: graph.clone(),
        }
    }

    /// The variables of this pattern in subject, predicate, object, graph
    /// order, without duplicates.
    pub fn variables(&self) -> Vec<Variable> {
        let mut variables = Vec::new();
        let mut push = |variable: &Variable| {
            if !variables.contains(variable) {
                variables.push(variable.clone());
            }
        };
        if let TermPattern::Variable(v) = &self.subject {
            push(v);
        }
        if let NamedNodePattern::Variable(v) = &self.predicate {
            push(v);
        }
        if let TermPattern::Variable(v) = &self.object {
            push(v);
        }
        if let GraphNamePattern::Variable(v) = &self.graph {
            push(v);
        }
        variables
    }

    /// Matches `quad` against this pattern, producing the variable bindings.
    ///
    /// Repeated variables must match equal terms; `None` means no match.
    pub fn match_quad(&self, quad: &Quad) -> Option<Bindings> {
        let bindings = Bindings::new();
        let bindings =
            match_term_pattern(&self.subject, &Term::from(quad.subject.clone()), bindings)?;
        let bindings = match &self.predicate {
            NamedNodePattern::NamedNode(n) => {
                (*n == quad.predicate).then_some(bindings)?
            }
            NamedNodePattern::Variable(v) => {
                bind_consistent(bindings, v, Term::from(quad.predicate.clone()))?
            }
        };
        let bindings = match_term_pattern(&self.object, &quad.object, bindings)?;
        match (&self.graph, &quad.graph_name) {
            (GraphNamePattern::DefaultGraph, GraphName::DefaultGraph) => Some(bindings),
            (GraphNamePattern::NamedNode(n), GraphName::NamedNode(g)) => {
                (n == g).then_some(bindings)
            }
            // GRAPH ?g ranges over named graphs only.
            (GraphNamePattern::Variable(v), GraphName::NamedNode(g)) => {
                bind_consistent(bindings, v, Term::from(g.clone()))
            }
            (GraphNamePattern::Variable(v), GraphName::BlankNode(g)) => {
                bind_consistent(bindings, v, Term::from(g.clone()))
            }
            _ => None,
        }
    }

    /// Replaces variables bound in `bindings` by their terms.
    ///
    /// `None` means a variable is bound to a term that cannot occupy its
    /// position (e.g. a literal predicate); such a pattern matches nothing.
    pub fn substitute(&self, bindings: &Bindings) -> Option<QuadPattern> {
        let subject = substitute_term_pattern(&self.subject, bindings)?;
        let predicate = match &self.predicate {
            NamedNodePattern::Variable(v) => match bindings.get(v) {
                Some(Term::NamedNode(n)) => NamedNodePattern::NamedNode(n.clone()),
                Some(_) => return None,
                None => self.predicate.clone(),
            },
            bound => bound.clone(),
        };
        let object = substitute_term_pattern(&self.object, bindings)?;
        let graph = match &self.graph {
            GraphNamePattern::Variable(v) => match bindings.get(v) {
                Some(Term::NamedNode(n)) => GraphNamePattern::NamedNode(n.clone()),
                Some(_) => return None,
                None => self.graph.clone(),
            },
            bound => bound.clone(),
        };
        Some(QuadPattern {
            subject,
            predicate,
            object,
            graph,
        })
    }
}

impl fmt::Display for QuadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.subject, self.predicate, self.object, self.graph
        )
    }
}

fn bind_consistent(bindings: Bindings, variable: &Variable, term: Term) -> Option<Bindings> {
    match bindings.get(variable) {
        Some(bound) if *bound == term => Some(bindings),
        Some(_) => None,
        None => Some(bindings.bind(variable.clone(), term)),
    }
}

fn match_term_pattern(
    pattern: &TermPattern,
    term: &Term,
    bindings: Bindings,
) -> Option<Bindings> {
    match pattern {
        TermPattern::NamedNode(n) => match term {
            Term::NamedNode(t) => (n == t).then_some(bindings),
            _ => None,
        },
        TermPattern::Literal(l) => match term {
            Term::Literal(t) => (l == t).then_some(bindings),
            _ => None,
        },
        // Query blank nodes are rewritten to variables before resolution, so
        // a blank node here is a ground reference (path traversal, bound
        // substitution) and matches by equality.
        TermPattern::BlankNode(b) => match term {
            Term::BlankNode(t) => (b == t).then_some(bindings),
            _ => None,
        },
        TermPattern::Variable(v) => bind_consistent(bindings, v, term.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn substitute_term_pattern(
    pattern: &TermPattern,
    bindings: &Bindings,
) -> Option<TermPattern> {
    Some(match pattern {
        TermPattern::Variable(v) => match bindings.get(v) {
            Some(Term::NamedNode(n)) => TermPattern::NamedNode(n.clone()),
            Some(Term::BlankNode(b)) => TermPattern::BlankNode(b.clone()),
            Some(Term::Literal(l)) => TermPattern::Literal(l.clone()),
            #[allow(unreachable_patterns)]
            Some(_) => return None,
            None => pattern.clone(),
        },
        bound => bound.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode};

    fn iri(value: &str) -> NamedNode {
        NamedNode::new_unchecked(value)
    }

    fn quad(s: &str, p: &str, o: &str) -> Quad {
        Quad::new(iri(s), iri(p), iri(o), GraphName::DefaultGraph)
    }

    #[test]
    fn match_binds_variables_by_position() {
        let pattern = QuadPattern::new(
            Variable::new_unchecked("s"),
            iri("http://example.com/p"),
            Variable::new_unchecked("o"),
            GraphNamePattern::DefaultGraph,
        );
        let bindings = pattern
            .match_quad(&quad(
                "http://example.com/a",
                "http://example.com/p",
                "http://example.com/b",
            ))
            .expect("matches");
        assert_eq!(
            bindings.get(&Variable::new_unchecked("s")),
            Some(&Term::from(iri("http://example.com/a")))
        );
        assert_eq!(
            bindings.get(&Variable::new_unchecked("o")),
            Some(&Term::from(iri("http://example.com/b")))
        );
    }

    #[test]
    fn repeated_variables_must_agree() {
        let pattern = QuadPattern::new(
            Variable::new_unchecked("x"),
            iri("http://example.com/p"),
            Variable::new_unchecked("x"),
            GraphNamePattern::DefaultGraph,
        );
        assert!(pattern
            .match_quad(&quad(
                "http://example.com/a",
                "http://example.com/p",
                "http://example.com/b",
            ))
            .is_none());
        assert!(pattern
            .match_quad(&quad(
                "http://example.com/a",
                "http://example.com/p",
                "http://example.com/a",
            ))
            .is_some());
    }

    #[test]
    fn substitute_rejects_a_literal_predicate() {
        let pattern = QuadPattern::new(
            Variable::new_unchecked("s"),
            Variable::new_unchecked("p"),
            Variable::new_unchecked("o"),
            GraphNamePattern::DefaultGraph,
        );
        let bindings =
            Bindings::new().bind(Variable::new_unchecked("p"), Literal::from(1).into());
        assert!(pattern.substitute(&bindings).is_none());
    }
}
