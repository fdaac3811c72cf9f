use crate::{BindingsStream, SendableBindingsStream};
use futures::{Stream, StreamExt};
use rdf_relay_common::{EngineError, EngineResult};
use rdf_relay_model::{Bindings, Variable};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

/// Enforces a wall-clock deadline on a bindings stream.
///
/// Once the deadline passes, the inner stream is dropped (cancelling its
/// upstreams) and a single [`EngineError::Cancelled`] is emitted so consumers
/// can tell expiry from exhaustion. The check runs per demand; an idle,
/// undemanded stream holds no timers.
pub struct DeadlineStream {
    inner: Option<SendableBindingsStream>,
    variables: Arc<[Variable]>,
    deadline: Instant,
    expired: bool,
}

impl DeadlineStream {
    pub fn new(inner: SendableBindingsStream, deadline: Instant) -> Self {
        let variables = Arc::clone(inner.variables());
        Self {
            inner: Some(inner),
            variables,
            deadline,
            expired: false,
        }
    }
}

impl Stream for DeadlineStream {
    type Item = EngineResult<Bindings>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }
        if Instant::now() >= this.deadline {
            this.expired = true;
            this.inner = None;
            return Poll::Ready(Some(Err(EngineError::Cancelled(
                "query deadline exceeded".into(),
            ))));
        }
        match &mut this.inner {
            Some(inner) => inner.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl BindingsStream for DeadlineStream {
    fn variables(&self) -> &Arc<[Variable]> {
        &self.variables
    }
}
