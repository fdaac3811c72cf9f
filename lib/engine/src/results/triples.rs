use futures::{ready, Stream, StreamExt};
use rdf_relay_api::ResolvedBindings;
use rdf_relay_common::EngineError;
use rdf_relay_model::{BlankNode, NamedNode, Subject, Term, Triple};
use rdf_relay_streams::SendableBindingsStream;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream of triples, produced by `CONSTRUCT` template instantiation or a
/// `DESCRIBE` expansion.
///
/// Template blank nodes are scoped per solution: the same label within one
/// solution names one node, across solutions it names fresh ones. Triples
/// with an unbound or ill-typed position are skipped, per SPARQL.
pub struct QueryTripleStream {
    source: TripleSource,
    pending: VecDeque<Triple>,
}

enum TripleSource {
    Template {
        template: Vec<TriplePattern>,
        solutions: SendableBindingsStream,
        solution_index: u64,
    },
    Materialized,
}

impl QueryTripleStream {
    pub fn from_template(template: Vec<TriplePattern>, resolved: ResolvedBindings) -> Self {
        Self {
            source: TripleSource::Template {
                template,
                solutions: resolved.stream,
                solution_index: 0,
            },
            pending: VecDeque::new(),
        }
    }

    pub fn from_triples(triples: Vec<Triple>) -> Self {
        Self {
            source: TripleSource::Materialized,
            pending: triples.into(),
        }
    }
}

impl Stream for QueryTripleStream {
    type Item = Result<Triple, EngineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(triple) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(triple)));
            }
            let TripleSource::Template {
                template,
                solutions,
                solution_index,
            } = &mut this.source
            else {
                return Poll::Ready(None);
            };
            match ready!(solutions.poll_next_unpin(cx)) {
                Some(Ok(bindings)) => {
                    let scope = *solution_index;
                    *solution_index += 1;
                    this.pending.extend(template.iter().filter_map(|pattern| {
                        instantiate(pattern, |v| bindings.get(v).cloned(), scope)
                    }));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    this.source = TripleSource::Materialized;
                }
            }
        }
    }
}

fn instantiate(
    pattern: &TriplePattern,
    value_of: impl Fn(&rdf_relay_model::Variable) -> Option<Term>,
    scope: u64,
) -> Option<Triple> {
    let scoped_blank =
        |b: &BlankNode| BlankNode::new_unchecked(format!("{}_s{scope}", b.as_str()));
    let subject: Subject = match &pattern.subject {
        TermPattern::NamedNode(n) => n.clone().into(),
        TermPattern::BlankNode(b) => scoped_blank(b).into(),
        TermPattern::Variable(v) => match value_of(v)? {
            Term::NamedNode(n) => n.into(),
            Term::BlankNode(b) => b.into(),
            _ => return None,
        },
        _ => return None,
    };
    let predicate: NamedNode = match &pattern.predicate {
        NamedNodePattern::NamedNode(n) => n.clone(),
        NamedNodePattern::Variable(v) => match value_of(v)? {
            Term::NamedNode(n) => n,
            _ => return None,
        },
    };
    let object: Term = match &pattern.object {
        TermPattern::NamedNode(n) => n.clone().into(),
        TermPattern::BlankNode(b) => scoped_blank(b).into(),
        TermPattern::Literal(l) => l.clone().into(),
        TermPattern::Variable(v) => value_of(v)?,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(Triple::new(subject, predicate, object))
}
