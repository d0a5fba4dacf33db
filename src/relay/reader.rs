//! Consumer side of the relay

use super::RelayError;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// The single readable conduit of a relay session.
///
/// Yields chunks in arrival order. An `Err` item means the session ended
/// abnormally and is always the last item. Dropping the stream counts as a
/// consumer disconnect and cancels the active producer.
pub struct RelayStream {
    inner: ReceiverStream<Result<Bytes, RelayError>>,
}

impl RelayStream {
    pub(super) fn new(rx: mpsc::Receiver<Result<Bytes, RelayError>>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStream").finish_non_exhaustive()
    }
}
