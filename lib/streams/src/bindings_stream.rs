use futures::{Stream, StreamExt};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{Bindings, Variable};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// A lazy, asynchronous, single-consumption sequence of solution mappings.
///
/// Alongside the items, every bindings stream carries its `variables` list.
/// The list is insertion-significant: projection and serialization emit
/// columns in this order, independent of which variables a particular
/// solution happens to bind.
///
/// Streams are pull-based (`poll_next`), which makes backpressure implicit:
/// upstreams produce at most one item per downstream demand. Dropping a
/// stream cancels it; state machines own their upstreams, so cancellation
/// cascades.
pub trait BindingsStream: Stream<Item = EngineResult<Bindings>> {
    /// The variables of the solutions this stream emits.
    fn variables(&self) -> &Arc<[Variable]>;
}

/// A boxed, sendable [`BindingsStream`], the unit of exchange between
/// operators.
pub type SendableBindingsStream = Pin<Box<dyn BindingsStream + Send>>;

/// Combines a variables list with an inner stream of solutions.
///
/// Most operators produce their output by wrapping a transformed stream in
/// this adapter.
pub struct BindingsStreamAdapter<S> {
    variables: Arc<[Variable]>,
    inner: S,
}

impl<S> BindingsStreamAdapter<S>
where
    S: Stream<Item = EngineResult<Bindings>> + Send + Unpin + 'static,
{
    pub fn new(variables: Arc<[Variable]>, inner: S) -> Self {
        Self { variables, inner }
    }

    /// Boxes the adapter into a [`SendableBindingsStream`].
    pub fn sendable(variables: Arc<[Variable]>, inner: S) -> SendableBindingsStream {
        Box::pin(Self::new(variables, inner))
    }
}

impl<S> Stream for BindingsStreamAdapter<S>
where
    S: Stream<Item = EngineResult<Bindings>> + Unpin,
{
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl<S> BindingsStream for BindingsStreamAdapter<S>
where
    S: Stream<Item = EngineResult<Bindings>> + Unpin,
{
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}

/// The empty stream over the given variables.
pub fn empty(variables: Arc<[Variable]>) -> SendableBindingsStream {
    BindingsStreamAdapter::sendable(variables, futures::stream::empty())
}

/// A single-solution stream.
pub fn once(variables: Arc<[Variable]>, bindings: Bindings) -> SendableBindingsStream {
    BindingsStreamAdapter::sendable(variables, futures::stream::iter([Ok(bindings)]))
}

/// A stream over an already materialized list of solutions.
pub fn from_solutions(
    variables: Arc<[Variable]>,
    solutions: Vec<Bindings>,
) -> SendableBindingsStream {
    BindingsStreamAdapter::sendable(
        variables,
        futures::stream::iter(solutions.into_iter().map(Ok)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SliceStream;
    use futures::stream::SelectAll;
    use rdf_relay_common::EngineError;
    use rdf_relay_model::NamedNode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    fn solution(name: &str) -> Bindings {
        Bindings::new().bind(
            Variable::new_unchecked("s"),
            NamedNode::new_unchecked(format!("http://example.com/{name}")).into(),
        )
    }

    #[tokio::test]
    async fn an_erroring_branch_does_not_break_its_siblings() {
        let variables: Arc<[Variable]> = Arc::new([Variable::new_unchecked("s")]);
        // One branch delivers a single solution and then fails; the other is
        // healthy with two.
        let failing = BindingsStreamAdapter::sendable(
            Arc::clone(&variables),
            futures::stream::iter(vec![
                Ok(solution("a")),
                Err(EngineError::source("http://example.com/bad", "boom")),
            ]),
        );
        let healthy = from_solutions(
            Arc::clone(&variables),
            vec![solution("b"), solution("c")],
        );

        let mut branches = SelectAll::new();
        branches.push(failing);
        branches.push(healthy);
        let out: Vec<_> = branches.collect().await;

        assert_eq!(out.iter().filter(|item| item.is_ok()).count(), 3);
        assert_eq!(out.iter().filter(|item| item.is_err()).count(), 1);
    }

    /// Flags its drop, standing in for a source holding a connection.
    struct ReleaseProbe {
        inner: SendableBindingsStream,
        released: Arc<AtomicBool>,
    }

    impl Drop for ReleaseProbe {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    impl Stream for ReleaseProbe {
        type Item = EngineResult<Bindings>;

        fn poll_next(
            self: std::pin::Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<Option<Self::Item>> {
            self.get_mut().inner.poll_next_unpin(cx)
        }
    }

    impl BindingsStream for ReleaseProbe {
        fn variables(&self) -> &Arc<[Variable]> {
            self.inner.variables()
        }
    }

    #[tokio::test]
    async fn exhausting_a_slice_releases_its_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let upstream = from_solutions(
            Arc::new([Variable::new_unchecked("s")]),
            vec![solution("a"), solution("b"), solution("c")],
        );
        let probe = ReleaseProbe {
            inner: upstream,
            released: Arc::clone(&released),
        };
        let mut sliced = SliceStream::new(Box::pin(probe), 0, Some(1));

        assert!(sliced.next().await.is_some());
        // The take budget is exhausted: the next demand must both end the
        // stream and drop the upstream, releasing its resources.
        assert!(sliced.next().await.is_none());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropping_a_stream_cascades_to_its_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let upstream = from_solutions(
            Arc::new([Variable::new_unchecked("s")]),
            vec![solution("a"), solution("b")],
        );
        let probe = ReleaseProbe {
            inner: upstream,
            released: Arc::clone(&released),
        };
        let mut sliced = SliceStream::new(Box::pin(probe), 0, None);
        assert!(sliced.next().await.is_some());
        drop(sliced);
        assert!(released.load(Ordering::SeqCst));
    }
}
