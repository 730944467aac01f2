//! Futures returned by asynchronous operations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use zkfault_client::{ErrorCode, KeeperError};

use crate::error::Result;

pub(crate) type ResponseSender<R> = oneshot::Sender<Result<R>>;

/// Resolves once with the outcome of an asynchronous operation.
///
/// If the client drops the completion continuation without calling it, the
/// future resolves to a `ConnectionLoss` error.
#[derive(Debug)]
pub struct ResponseFuture<R> {
    receiver: oneshot::Receiver<Result<R>>,
}

impl<R> ResponseFuture<R> {
    pub(crate) fn channel() -> (ResponseSender<R>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Returns the outcome if it is already available.
    pub fn try_take(&mut self) -> Option<Result<R>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned().into())),
        }
    }
}

impl<R> Future for ResponseFuture<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or_else(|_| Err(abandoned().into())))
    }
}

/// Sends `outcome`; a caller that dropped the future no longer cares.
pub(crate) fn resolve<R>(sender: ResponseSender<R>, outcome: Result<R>) {
    let _ = sender.send(outcome);
}

fn abandoned() -> KeeperError {
    KeeperError::new(
        ErrorCode::ConnectionLoss,
        "completion callback dropped without a response",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_with_sent_value() {
        let (sender, future) = ResponseFuture::channel();
        resolve(sender, Ok(7));
        assert_eq!(future.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn dropped_sender_is_connection_loss() {
        let (sender, future) = ResponseFuture::<u8>::channel();
        drop(sender);
        let err = future.await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConnectionLoss));
    }

    #[test]
    fn try_take_before_and_after_resolution() {
        let (sender, mut future) = ResponseFuture::channel();
        assert!(future.try_take().is_none());
        resolve(sender, Ok("done"));
        assert_eq!(future.try_take().unwrap().unwrap(), "done");
    }
}
