use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Result, TransferError};

/// Resolves to the single result of a transfer.
///
/// The transfer runs on spawned tasks whether or not this is awaited; dropping it only discards the
/// result.
#[must_use = "the transfer result is only observable through the completion"]
pub struct TransferCompletion {
    result: oneshot::Receiver<Result<()>>,
}

impl TransferCompletion {
    pub(crate) fn new(result: oneshot::Receiver<Result<()>>) -> Self {
        Self { result }
    }

    /// A completion that is already resolved, for transfers rejected before any task was spawned.
    pub(crate) fn ready(result: Result<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self::new(rx)
    }
}

impl Future for TransferCompletion {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.result).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(_) => Poll::Ready(Err(TransferError::Abandoned)),
        }
    }
}

impl fmt::Debug for TransferCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferCompletion").finish_non_exhaustive()
    }
}

/// Phases of one transfer, as they appear in the `state` field of transfer log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    SourcesResolving,
    Streaming,
    Finalizing,
    Succeeded,
    Failed,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::SourcesResolving => "sources_resolving",
            TransferState::Streaming => "streaming",
            TransferState::Finalizing => "finalizing",
            TransferState::Succeeded => "succeeded",
            TransferState::Failed => "failed",
        }
    }

    /// Terminal state for a transfer outcome.
    pub fn of_outcome<T>(outcome: &Result<T>) -> Self {
        if outcome.is_ok() {
            TransferState::Succeeded
        } else {
            TransferState::Failed
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
