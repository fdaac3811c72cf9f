use async_trait::async_trait;
use rdf_relay_api::{
    Actor, EngineView, FetchRequest, QuadPatternAction, QueryContext, ResolvedQuads,
    Source, SourceKind, TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineError, EngineResult};
use rdf_relay_model::{
    GraphName, NamedNodePattern, Quad, QuadPattern, Subject, Term, TermPattern, Variable,
};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use rdf_relay_model::GraphNamePattern;

const SPARQL_QUERY: &str = "application/sparql-query";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Resolves quad patterns against a remote SPARQL protocol endpoint.
///
/// The pattern is sent as a `SELECT` (or `ASK`, when fully ground) and the
/// matching quads are rebuilt from the returned solutions. Blank nodes in
/// the pattern are sent as variables, since blank node identity does not
/// cross endpoint boundaries; the positional re-check downstream drops
/// solutions that do not line up.
pub struct SparqlEndpointActor;

#[async_trait]
impl Actor<QuadPatternAction> for SparqlEndpointActor {
    fn name(&self) -> &'static str {
        "source-sparql"
    }

    fn test(&self, _action: &QuadPatternAction, ctx: &QueryContext) -> TestOutcome {
        match ctx.sources() {
            [Source::Iri {
                kind: SourceKind::Sparql,
                ..
            }] => TestOutcome::passed(),
            _ => TestOutcome::Rejected("requires a single SPARQL endpoint source"),
        }
    }

    async fn run(
        &self,
        action: QuadPatternAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedQuads> {
        let [Source::Iri { value: endpoint, .. }] = ctx.sources() else {
            return EngineError::internal("sparql actor ran without an endpoint source");
        };
        let wire = WirePattern::new(&action.pattern);
        let query = wire.to_query();
        tracing::debug!(endpoint = %endpoint, query = %query, "querying remote endpoint");

        let request = FetchRequest::post(endpoint, query.into_bytes(), SPARQL_QUERY)
            .with_accept(SPARQL_RESULTS_JSON)
            .with_auth(ctx.auth().map(str::to_owned), ctx.include_credentials());
        let response = view.fetcher.fetch(request).await?;
        if !response.ok {
            return Err(EngineError::source(
                endpoint,
                format!("HTTP status {}", response.status),
            ));
        }

        let parser = QueryResultsParser::from_format(QueryResultsFormat::Json);
        let quads = match parser.for_reader(response.body.as_slice())? {
            ReaderQueryResultsParserOutput::Boolean(true) => {
                wire.ground_quad().into_iter().collect()
            }
            ReaderQueryResultsParserOutput::Boolean(false) => Vec::new(),
            ReaderQueryResultsParserOutput::Solutions(solutions) => {
                let mut quads = Vec::new();
                for solution in solutions {
                    let solution = solution?;
                    if let Some(quad) = wire.rebuild_quad(&solution) {
                        quads.push(quad);
                    }
                }
                quads
            }
        };

        let cardinality = Cardinality::from(quads.len());
        Ok(ResolvedQuads {
            stream: Box::pin(futures::stream::iter(quads.into_iter().map(Ok))),
            cardinality,
        })
    }
}

/// The pattern as sent over the wire: blank nodes replaced by variables so
/// the query is expressible in SPARQL.
struct WirePattern {
    subject: TermPattern,
    predicate: NamedNodePattern,
    object: TermPattern,
    graph: GraphNamePattern,
}

impl WirePattern {
    fn new(pattern: &QuadPattern) -> Self {
        let mut n = 0;
        let mut debnode = |position: &TermPattern| match position {
            TermPattern::BlankNode(_) => {
                n += 1;
                TermPattern::Variable(Variable::new_unchecked(format!("rr_bnode_{n}")))
            }
            other => other.clone(),
        };
        Self {
            subject: debnode(&pattern.subject),
            predicate: pattern.predicate.clone(),
            object: debnode(&pattern.object),
            graph: pattern.graph.clone(),
        }
    }

    fn variables(&self) -> Vec<&Variable> {
        let mut variables = Vec::new();
        if let TermPattern::Variable(v) = &self.subject {
            variables.push(v);
        }
        if let NamedNodePattern::Variable(v) = &self.predicate {
            if !variables.contains(&v) {
                variables.push(v);
            }
        }
        if let TermPattern::Variable(v) = &self.object {
            if !variables.contains(&v) {
                variables.push(v);
            }
        }
        if let GraphNamePattern::Variable(v) = &self.graph {
            if !variables.contains(&v) {
                variables.push(v);
            }
        }
        variables
    }

    fn to_query(&self) -> String {
        let triple = format!("{} {} {}", self.subject, self.predicate, self.object);
        let body = match &self.graph {
            GraphNamePattern::DefaultGraph => format!("{triple} ."),
            GraphNamePattern::NamedNode(graph) => format!("GRAPH {graph} {{ {triple} . }}"),
            GraphNamePattern::Variable(graph) => format!("GRAPH {graph} {{ {triple} . }}"),
        };
        let variables = self.variables();
        if variables.is_empty() {
            format!("ASK {{ {body} }}")
        } else {
            let projection = variables
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            format!("SELECT {projection} WHERE {{ {body} }}")
        }
    }

    /// The quad a successful `ASK` stands for. `None` when the pattern was
    /// not fully ground after all.
    fn ground_quad(&self) -> Option<Quad> {
        self.quad_from(|_| None)
    }

    fn rebuild_quad(&self, solution: &sparesults::QuerySolution) -> Option<Quad> {
        self.quad_from(|variable| solution.get(variable).cloned())
    }

    fn quad_from(&self, mut value_of: impl FnMut(&Variable) -> Option<Term>) -> Option<Quad> {
        let subject: Subject = match &self.subject {
            TermPattern::NamedNode(n) => n.clone().into(),
            TermPattern::BlankNode(b) => b.clone().into(),
            TermPattern::Variable(v) => match value_of(v)? {
                Term::NamedNode(n) => n.into(),
                Term::BlankNode(b) => b.into(),
                _ => return None,
            },
            _ => return None,
        };
        let predicate = match &self.predicate {
            NamedNodePattern::NamedNode(n) => n.clone(),
            NamedNodePattern::Variable(v) => match value_of(v)? {
                Term::NamedNode(n) => n,
                _ => return None,
            },
        };
        let object = match &self.object {
            TermPattern::Variable(v) => value_of(v)?,
            ground => pattern_term(ground)?,
        };
        let graph: GraphName = match &self.graph {
            GraphNamePattern::DefaultGraph => GraphName::DefaultGraph,
            GraphNamePattern::NamedNode(g) => g.clone().into(),
            GraphNamePattern::Variable(v) => match value_of(v)? {
                Term::NamedNode(g) => g.into(),
                Term::BlankNode(g) => g.into(),
                _ => return None,
            },
        };
        Some(Quad::new(subject, predicate, object, graph))
    }
}

fn pattern_term(pattern: &TermPattern) -> Option<Term> {
    match pattern {
        TermPattern::NamedNode(n) => Some(n.clone().into()),
        TermPattern::BlankNode(b) => Some(b.clone().into()),
        TermPattern::Literal(l) => Some(l.clone().into()),
        TermPattern::Variable(_) => None,
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_relay_model::NamedNode;

    #[test]
    fn renders_a_select_for_open_positions() {
        let pattern = QuadPattern::new(
            Variable::new_unchecked("s"),
            NamedNode::new_unchecked("http://example.com/p"),
            Variable::new_unchecked("o"),
            GraphNamePattern::DefaultGraph,
        );
        let query = WirePattern::new(&pattern).to_query();
        assert_eq!(
            query,
            "SELECT ?s ?o WHERE { ?s <http://example.com/p> ?o . }"
        );
    }

    #[test]
    fn renders_an_ask_for_a_ground_pattern() {
        let pattern = QuadPattern::new(
            NamedNode::new_unchecked("http://example.com/a"),
            NamedNode::new_unchecked("http://example.com/p"),
            NamedNode::new_unchecked("http://example.com/b"),
            GraphNamePattern::DefaultGraph,
        );
        let query = WirePattern::new(&pattern).to_query();
        assert!(query.starts_with("ASK {"));
    }
}
