//! Error types for the worker channel.

use std::time::Duration;

use originfs_core::FsError;
use thiserror::Error;

use crate::protocol::OpKind;

/// A native storage failure reported by whoever executed the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    /// The entry did not exist.
    pub not_found: bool,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            not_found: false,
        }
    }
}

impl From<FsError> for RemoteError {
    fn from(e: FsError) -> Self {
        Self {
            not_found: e.is_not_found(),
            message: e.to_string(),
        }
    }
}

/// The worker could not be started.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The worker's runtime could not be built.
    #[error("failed to build worker runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The worker thread could not be started.
    #[error("failed to start worker thread: {0}")]
    Thread(#[source] std::io::Error),

    /// The spawner refused for another reason.
    #[error("worker refused: {0}")]
    Refused(String),
}

/// Errors surfaced by [`WorkerChannel::request`](crate::WorkerChannel::request).
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// No worker is available and there is no direct handler for the op.
    #[error("no channel available for {op}")]
    NoChannel { op: OpKind },

    /// One attempt did not get a reply in time.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: OpKind, after: Duration },

    /// The message could not be delivered or the reply slot was dropped.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Every attempt failed.
    #[error("{op} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        op: OpKind,
        attempts: u32,
        last: String,
    },

    /// The request reached storage and storage said no.
    #[error("{op} failed: {error}")]
    Remote { op: OpKind, error: RemoteError },

    /// The reply did not have the shape the op promises.
    #[error("unexpected reply to {op}")]
    UnexpectedReply { op: OpKind },
}

impl ChannelError {
    /// True for failures of the channel itself, as opposed to storage
    /// errors that merely travelled over it.
    pub fn is_channel_failure(&self) -> bool {
        !matches!(self, ChannelError::Remote { .. })
    }

    /// True if another attempt might succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChannelError::Timeout { .. } | ChannelError::Transport { .. }
        )
    }
}

/// Result alias for channel requests.
pub type Result<T> = std::result::Result<T, ChannelError>;
