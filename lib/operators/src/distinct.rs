use async_trait::async_trait;
use futures::{ready, Stream, StreamExt};
use rdf_relay_api::{
    operation_kind, Actor, EngineView, OperationAction, QueryContext, ResolvedBindings,
    TestOutcome,
};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use rdf_relay_streams::{BindingsStream, SendableBindingsStream};
use rustc_hash::FxHashSet;
use spargebra::algebra::GraphPattern;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// How many recent solutions `REDUCED` remembers. SPARQL allows partial
/// duplicate suppression, so the window trades memory for dedup quality.
const REDUCED_WINDOW: usize = 1024;

/// Exact duplicate suppression: emits the first occurrence of every
/// solution, in first-occurrence order.
pub struct DistinctOperator;

#[async_trait]
impl Actor<OperationAction> for DistinctOperator {
    fn name(&self) -> &'static str {
        "operator-distinct"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "distinct" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a distinct node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Distinct { inner } = action.operation else {
            return EngineError::internal("distinct operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let cardinality = resolved.cardinality.weaken();
        Ok(ResolvedBindings::new(
            Box::pin(DedupStream::new(resolved.stream, None)),
            cardinality,
        ))
    }
}

/// Windowed duplicate suppression for `REDUCED`.
pub struct ReducedOperator;

#[async_trait]
impl Actor<OperationAction> for ReducedOperator {
    fn name(&self) -> &'static str {
        "operator-reduced"
    }

    fn test(&self, action: &OperationAction, _ctx: &QueryContext) -> TestOutcome {
        match operation_kind(&action.operation) {
            "reduced" => TestOutcome::passed(),
            _ => TestOutcome::Rejected("not a reduced node"),
        }
    }

    async fn run(
        &self,
        action: OperationAction,
        ctx: &QueryContext,
        view: &EngineView,
    ) -> EngineResult<ResolvedBindings> {
        let GraphPattern::Reduced { inner } = action.operation else {
            return EngineError::internal("reduced operator dispatched on a foreign node");
        };
        let resolved = view.evaluate_operation(*inner, ctx).await?;
        let cardinality = resolved.cardinality.weaken();
        Ok(ResolvedBindings::new(
            Box::pin(DedupStream::new(resolved.stream, Some(REDUCED_WINDOW))),
            cardinality,
        ))
    }
}

struct DedupStream {
    inner: SendableBindingsStream,
    variables: Arc<[Variable]>,
    seen: FxHashSet<Bindings>,
    /// Insertion order of `seen`, for window eviction; unbounded when
    /// `window` is `None`.
    recency: VecDeque<Bindings>,
    window: Option<usize>,
}

impl DedupStream {
    fn new(inner: SendableBindingsStream, window: Option<usize>) -> Self {
        let variables = Arc::clone(inner.variables());
        Self {
            inner,
            variables,
            seen: FxHashSet::default(),
            recency: VecDeque::new(),
            window,
        }
    }
}

impl Stream for DedupStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(bindings)) => {
                    if !this.seen.insert(bindings.clone()) {
                        continue;
                    }
                    if let Some(window) = this.window {
                        this.recency.push_back(bindings.clone());
                        if this.recency.len() > window {
                            if let Some(evicted) = this.recency.pop_front() {
                                this.seen.remove(&evicted);
                            }
                        }
                    }
                    return Poll::Ready(Some(Ok(bindings)));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl BindingsStream for DedupStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}
