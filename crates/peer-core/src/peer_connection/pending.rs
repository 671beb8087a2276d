//! Results of queued operations

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::error;

use crate::error::Result;

/// Eventual result of a negotiation operation
///
/// Resolves to `Some(result)` once the operation ran, or to `None` if it was
/// abandoned: the connection was closed before it ran, or the SDP processor
/// failed internally. An abandoned operation is never settled, so callers that
/// only poll with [`PendingResult::try_take`] simply keep seeing `None`.
#[derive(Debug)]
pub struct PendingResult<T> {
    rx: oneshot::Receiver<Result<T>>,
}

/// Completion side of a [`PendingResult`]
pub(crate) type Completer<T> = oneshot::Sender<Result<T>>;

impl<T> PendingResult<T> {
    pub(crate) fn channel() -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A result that is already settled
    pub(crate) fn ready(result: Result<T>) -> Self {
        let (tx, pending) = Self::channel();
        let _ = tx.send(result);
        pending
    }

    /// A result that will never settle
    pub(crate) fn abandoned() -> Self {
        let (_, pending) = Self::channel();
        pending
    }

    /// Take the result if the operation already ran
    pub fn try_take(&mut self) -> Option<Result<T>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Future for PendingResult<T> {
    type Output = Option<Result<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| received.ok())
    }
}

/// Deliver `result` unless it is an internal error, which is only logged
pub(crate) fn settle<T>(operation: &str, completer: Completer<T>, result: Result<T>) {
    match result {
        Err(err) if err.is_internal() => {
            error!("{} abandoned: {}", operation, err);
        }
        result => {
            let _ = completer.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PeerConnectionError;

    #[tokio::test]
    async fn test_ready_result_resolves() {
        let pending = PendingResult::ready(Ok(5));
        assert_eq!(pending.await, Some(Ok(5)));
    }

    #[tokio::test]
    async fn test_abandoned_resolves_to_none() {
        let pending: PendingResult<()> = PendingResult::abandoned();
        assert_eq!(pending.await, None);
    }

    #[test]
    fn test_internal_errors_are_not_delivered() {
        let (tx, mut pending) = PendingResult::<()>::channel();
        settle("test", tx, Err(PeerConnectionError::Internal("boom".into())));
        assert!(pending.try_take().is_none());

        let (tx, mut pending) = PendingResult::<()>::channel();
        settle("test", tx, Err(PeerConnectionError::invalid_state("closed")));
        assert!(matches!(pending.try_take(), Some(Err(PeerConnectionError::InvalidState(_)))));
    }
}
