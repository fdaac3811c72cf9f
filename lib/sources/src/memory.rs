use async_trait::async_trait;
use rdf_relay_api::{
    Actor, EngineView, MemoryQuadSource, QuadPatternAction, QueryContext, ResolvedQuads,
    Source, TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineError, EngineResult};
use rdf_relay_model::{Dataset, Quad, QuadPattern};

/// A [`MemoryQuadSource`] backed by an [`oxrdf::Dataset`](Dataset).
pub struct DatasetSource {
    dataset: Dataset,
}

impl DatasetSource {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn from_quads(quads: impl IntoIterator<Item = Quad>) -> Self {
        Self {
            dataset: quads.into_iter().collect(),
        }
    }
}

impl MemoryQuadSource for DatasetSource {
    fn match_pattern(&self, pattern: &QuadPattern) -> Vec<Quad> {
        self.dataset
            .iter()
            .map(|quad| quad.into_owned())
            .filter(|quad| pattern.match_quad(quad).is_some())
            .collect()
    }
}

/// Resolves quad patterns against an in-memory source; the only actor on the
/// bus with exact cardinalities.
pub struct MemorySourceActor;

#[async_trait]
impl Actor<QuadPatternAction> for MemorySourceActor {
    fn name(&self) -> &'static str {
        "source-memory"
    }

    fn test(&self, _action: &QuadPatternAction, ctx: &QueryContext) -> TestOutcome {
        match ctx.sources() {
            [Source::Memory(_)] => TestOutcome::passed(),
            _ => TestOutcome::Rejected("requires a single in-memory source"),
        }
    }

    async fn run(
        &self,
        action: QuadPatternAction,
        ctx: &QueryContext,
        _view: &EngineView,
    ) -> EngineResult<ResolvedQuads> {
        let [Source::Memory(source)] = ctx.sources() else {
            return EngineError::internal("memory actor ran without a memory source");
        };
        let quads = source.match_pattern(&action.pattern);
        let cardinality = Cardinality::from(quads.len());
        Ok(ResolvedQuads {
            stream: Box::pin(futures::stream::iter(quads.into_iter().map(Ok))),
            cardinality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_relay_model::{
        GraphName, NamedNode, TermPattern, Variable,
    };
    use rdf_relay_model::GraphNamePattern;

    fn iri(value: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{value}"))
    }

    #[test]
    fn matches_only_the_requested_predicate() {
        let source = DatasetSource::from_quads([
            Quad::new(iri("a"), iri("p"), iri("b"), GraphName::DefaultGraph),
            Quad::new(iri("b"), iri("p"), iri("c"), GraphName::DefaultGraph),
            Quad::new(iri("a"), iri("q"), iri("c"), GraphName::DefaultGraph),
        ]);
        let pattern = QuadPattern::new(
            TermPattern::Variable(Variable::new_unchecked("s")),
            iri("p"),
            TermPattern::Variable(Variable::new_unchecked("o")),
            GraphNamePattern::DefaultGraph,
        );
        assert_eq!(source.match_pattern(&pattern).len(), 2);
    }
}
