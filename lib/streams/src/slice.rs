use crate::{BindingsStream, SendableBindingsStream};
use futures::{ready, Stream, StreamExt};
use rdf_relay_common::EngineResult;
use rdf_relay_model::{Bindings, Variable};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Drops the first `start` solutions of the inner stream and emits at most
/// `length` of the remainder.
///
/// Errors pass through without counting against either bound; once the take
/// budget is exhausted the inner stream is dropped, cancelling its upstreams.
pub struct SliceStream {
    inner: Option<SendableBindingsStream>,
    variables: Arc<[Variable]>,
    remaining_skip: u64,
    remaining_take: Option<u64>,
}

impl SliceStream {
    pub fn new(inner: SendableBindingsStream, start: u64, length: Option<u64>) -> Self {
        let variables = Arc::clone(inner.variables());
        Self {
            inner: Some(inner),
            variables,
            remaining_skip: start,
            remaining_take: length,
        }
    }
}

impl Stream for SliceStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.remaining_take == Some(0) {
                this.inner = None;
                return Poll::Ready(None);
            }
            let Some(inner) = &mut this.inner else {
                return Poll::Ready(None);
            };
            match ready!(inner.poll_next_unpin(cx)) {
                Some(Ok(bindings)) => {
                    if this.remaining_skip > 0 {
                        this.remaining_skip -= 1;
                        continue;
                    }
                    if let Some(remaining) = &mut this.remaining_take {
                        *remaining -= 1;
                    }
                    return Poll::Ready(Some(Ok(bindings)));
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl BindingsStream for SliceStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_solutions;
    use rdf_relay_model::{NamedNode, Term};

    fn solutions(n: usize) -> Vec<Bindings> {
        (0..n)
            .map(|i| {
                Bindings::new().bind(
                    Variable::new_unchecked("s"),
                    Term::from(NamedNode::new_unchecked(format!("http://example.com/{i}"))),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn slice_keeps_the_requested_window() {
        let all = solutions(4);
        let stream = SliceStream::new(
            from_solutions(Arc::new([Variable::new_unchecked("s")]), all.clone()),
            1,
            Some(2),
        );
        let out: Vec<_> = stream.map(|b| b.expect("no errors")).collect().await;
        assert_eq!(out, all[1..3].to_vec());
    }

    #[tokio::test]
    async fn slice_composes() {
        // slice(slice(X, a, b), c, d) == slice(X, a + c, min(b − c, d))
        let all = solutions(10);
        let vars: Arc<[Variable]> = Arc::new([Variable::new_unchecked("s")]);
        let nested = SliceStream::new(
            Box::pin(SliceStream::new(
                from_solutions(Arc::clone(&vars), all.clone()),
                2,
                Some(6),
            )),
            1,
            Some(3),
        );
        let flat = SliceStream::new(from_solutions(vars, all), 3, Some(3));
        let nested: Vec<_> = nested.map(|b| b.expect("no errors")).collect().await;
        let flat: Vec<_> = flat.map(|b| b.expect("no errors")).collect().await;
        assert_eq!(nested, flat);
    }
}
