use futures::{ready, Stream, StreamExt};
use rdf_relay_api::ResolvedBindings;
use rdf_relay_common::{Cardinality, EngineError};
use rdf_relay_model::Variable;
use rdf_relay_streams::SendableBindingsStream;
use sparesults::QuerySolution;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A stream over [`QuerySolution`]s.
///
/// Wraps a resolved bindings stream, carrying its variables and cardinality
/// estimate alongside. The estimate upper-bounds the delivered count for
/// exact backends.
pub struct QuerySolutionStream {
    variables: Arc<[Variable]>,
    cardinality: Cardinality,
    inner: SendableBindingsStream,
}

impl QuerySolutionStream {
    pub fn new(resolved: ResolvedBindings) -> Self {
        Self {
            variables: Arc::clone(resolved.variables()),
            cardinality: resolved.cardinality,
            inner: resolved.stream,
        }
    }

    /// The variables used in the solutions, in projection order.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The estimated number of solutions this stream will deliver.
    #[inline]
    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

impl Stream for QuerySolutionStream {
    type Item = Result<QuerySolution, EngineError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(this.inner.poll_next_unpin(cx)) {
            Some(Ok(bindings)) => {
                let terms = this
                    .variables
                    .iter()
                    .map(|variable| bindings.get(variable).cloned())
                    .collect::<Vec<_>>();
                Poll::Ready(Some(Ok((Arc::clone(&this.variables), terms).into())))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => Poll::Ready(None),
        }
    }
}
