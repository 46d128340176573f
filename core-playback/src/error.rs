//! # Queue Error Types
//!
//! Errors surfaced by the queue coordinator and its collaborators.
//!
//! `InvalidArgument` and `Busy` are recoverable: the caller may retry with
//! corrected input or once the in-flight operation completes.
//! `CacheConsistency` and `Integrity` are not recovered locally; the
//! coordinator drops to an empty queue before returning them.

use bridge_traits::SongId;
use thiserror::Error;

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// Bad ids, out-of-range index, or an operation that needs a loaded track.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Another queue mutation holds the guard.
    #[error("Queue is busy: {operation} in progress")]
    Busy { operation: &'static str },

    /// Song data is still missing after fetching it from the library.
    #[error("Songs could not be resolved after fetch: {missing:?}")]
    CacheConsistency { missing: Vec<SongId> },

    /// The audio engine rejected or timed out a command.
    #[error("Engine call `{operation}` failed: {message}")]
    Engine {
        operation: &'static str,
        message: String,
    },

    /// Queue state violates its invariants.
    #[error("Queue integrity violated: {0}")]
    Integrity(String),
}

impl QueueError {
    /// Returns `true` if the caller may retry after fixing input or waiting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QueueError::InvalidArgument(_) | QueueError::Busy { .. }
        )
    }

    /// Returns `true` if the coordinator must fall back to an empty queue.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            QueueError::CacheConsistency { .. } | QueueError::Integrity(_)
        )
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        QueueError::InvalidArgument(message.into())
    }
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
