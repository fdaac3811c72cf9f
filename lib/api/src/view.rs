use crate::{
    Dereferencer, Fetcher, JoinAction, Mediator, OperationAction, QuadPatternAction,
    QueryContext, ResolvedBindings,
};
use futures::StreamExt;
use rdf_relay_common::EngineResult;
use rdf_relay_model::QuadPattern;
use rdf_relay_streams::BindingsStreamAdapter;
use spargebra::algebra::GraphPattern;
use std::sync::Arc;

/// The read-only wiring of an engine instance, passed to every `run`.
///
/// Actors hold no references back into the engine; whatever they need to
/// recurse (mediating child operations, resolving patterns, joining) they
/// take from this view. That keeps ownership acyclic: buses own actors,
/// mediators reference buses, and the view bundles mediators.
#[derive(Clone)]
pub struct EngineView {
    pub query_operations: Arc<Mediator<OperationAction>>,
    pub quad_patterns: Arc<Mediator<QuadPatternAction>>,
    pub joins: Arc<Mediator<JoinAction>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub dereferencer: Arc<dyn Dereferencer>,
}

impl EngineView {
    /// Mediates a child algebra node to the query-operation bus.
    pub async fn evaluate_operation(
        &self,
        operation: GraphPattern,
        ctx: &QueryContext,
    ) -> EngineResult<ResolvedBindings> {
        self.query_operations
            .mediate(OperationAction::new(operation), ctx, self)
            .await
    }

    /// Resolves a quad pattern against the context's sources and maps the
    /// matching quads to solutions by variable position.
    ///
    /// The pattern is substituted with the context's initial bindings first;
    /// repeated-variable consistency is enforced here even when a source
    /// over-approximates its matches.
    pub async fn resolve_quad_pattern(
        &self,
        pattern: QuadPattern,
        ctx: &QueryContext,
    ) -> EngineResult<ResolvedBindings> {
        let Some(pattern) = pattern.substitute(ctx.initial_bindings()) else {
            // A position is pre-bound to a term it cannot hold.
            return Ok(ResolvedBindings::empty(pattern.variables().into()));
        };
        let variables: Arc<[_]> = pattern.variables().into();
        let resolved = self
            .quad_patterns
            .mediate(QuadPatternAction::new(pattern.clone()), ctx, self)
            .await?;
        let stream = resolved.stream.filter_map(move |quad| {
            let mapped = match quad {
                Ok(quad) => pattern.match_quad(&quad).map(Ok),
                Err(e) => Some(Err(e)),
            };
            async move { mapped }
        });
        Ok(ResolvedBindings::new(
            BindingsStreamAdapter::sendable(variables, Box::pin(stream)),
            resolved.cardinality,
        ))
    }
}
