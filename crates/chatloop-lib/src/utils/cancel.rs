// Cancellation helpers

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Stream wrapper that cancels a token when it is dropped.
///
/// Used for response bodies: when the client goes away the body is dropped
/// and every task bound to the token stops.
pub struct CancelOnDrop<S> {
    inner: S,
    _guard: DropGuard,
}

impl<S> CancelOnDrop<S> {
    pub fn new(inner: S, token: CancellationToken) -> Self {
        Self {
            inner,
            _guard: token.drop_guard(),
        }
    }
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_drop_cancels_token() {
        let token = CancellationToken::new();
        let mut stream = CancelOnDrop::new(futures::stream::iter(vec![1, 2]), token.clone());

        assert_eq!(stream.next().await, Some(1));
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
    }
}
