//! Error types for the node orchestrator.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type alias for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("failed to decode node response: {0}")]
    Encoding(String),

    #[error("node API error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("container engine error: {0}")]
    Container(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("{0}")]
    Precondition(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Filesystem(e.to_string())
    }
}

/// Race `fut` against `cancel`.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = NodeResult<T>>,
) -> NodeResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NodeError::Cancelled),
        result = fut => result,
    }
}

/// Sleep for `duration` unless cancelled first.
pub(crate) async fn sleep_or_cancel(
    cancel: &CancellationToken,
    duration: std::time::Duration,
) -> NodeResult<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NodeError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
