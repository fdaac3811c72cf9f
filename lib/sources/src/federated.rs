use async_trait::async_trait;
use futures::stream::SelectAll;
use rdf_relay_api::{
    Actor, EngineView, QuadPatternAction, QueryContext, ResolvedQuads, TestOutcome,
};
use rdf_relay_common::{Cardinality, EngineResult};

/// Resolves a pattern over several sources at once: each source gets a
/// sub-context restricted to itself and is re-mediated on the quad-pattern
/// bus, the result streams are interleaved, and the cardinalities summed.
pub struct FederatedSourceActor;

#[async_trait]
impl Actor<QuadPatternAction> for FederatedSourceActor {
    fn name(&self) -> &'static str {
        "source-federated"
    }

    fn test(&self, _action: &QuadPatternAction, ctx: &QueryContext) -> TestOutcome {
        if ctx.sources().len() > 1 {
            TestOutcome::passed()
        } else {
            TestOutcome::Rejected("requires more than one source")
        }
    }

    async fn run(
        &self,
        action: QuadPatternAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedQuads> {
        let resolutions = ctx.sources().iter().map(|source| {
            let sub_ctx = ctx.with_single_source(source.clone());
            let pattern = action.pattern.clone();
            async move {
                view.quad_patterns
                    .mediate(QuadPatternAction::new(pattern), &sub_ctx, view)
                    .await
            }
        });
        let resolved = futures::future::try_join_all(resolutions).await?;

        let mut cardinality = Cardinality::Exact(0);
        let mut streams = SelectAll::new();
        for entry in resolved {
            cardinality = cardinality.sum(entry.cardinality);
            streams.push(entry.stream);
        }
        Ok(ResolvedQuads {
            stream: Box::pin(streams),
            cardinality,
        })
    }
}
