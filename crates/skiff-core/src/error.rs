//! Error types for transfer scheduling.

use std::path::PathBuf;

use thiserror::Error;

use crate::operation::{FileRef, OperationKind};

/// Errors reported by a filesystem adapter for a whole operation.
///
/// An `Err` from an adapter call fails the task the same way a `false`
/// result does; the non-fatal per-file stream uses
/// [`OperationError`](crate::OperationError) instead.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// The transfer session failed or was lost.
    #[error("Session error: {message}")]
    Session { message: String },

    /// The operation was interrupted before it produced a result.
    #[error("Operation interrupted")]
    Interrupted,

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl TransferError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }
}

/// Configuration errors in how the scheduler or a batch is used.
///
/// These are programmer errors: raised synchronously at the call that
/// misused the API, never retried.
#[derive(Debug, Error)]
pub enum SchedError {
    /// A copy or move task was built without a destination.
    #[error("{kind} requires a destination")]
    MissingDestination { kind: OperationKind },

    /// A remove task was built with a destination.
    #[error("{kind} does not take a destination")]
    UnexpectedDestination { kind: OperationKind },

    /// A task's operation kind does not match its batch.
    #[error("Batch kind mismatch: batch is {expected}, task is {found}")]
    KindMismatch {
        expected: OperationKind,
        found: OperationKind,
    },

    /// A task's destination does not match its batch.
    #[error("Batch destination mismatch: batch targets {expected}")]
    DestinationMismatch { expected: FileRef },

    /// The batch was already activated.
    #[error("Batch is sealed: no changes allowed after activation")]
    BatchSealed,

    /// The batch has no members to activate.
    #[error("Cannot activate an empty batch")]
    EmptyBatch,

    /// The scheduler was shut down before the operation resolved.
    #[error("Scheduler closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_io_classification() {
        let err = TransferError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, TransferError::PermissionDenied { .. }));

        let err = TransferError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(matches!(err, TransferError::NotFound { .. }));

        let err = TransferError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe"),
        );
        assert!(matches!(err, TransferError::Io { .. }));
    }

    #[test]
    fn test_sched_error_display() {
        let err = SchedError::MissingDestination {
            kind: OperationKind::Copy,
        };
        assert_eq!(err.to_string(), "Copy requires a destination");
    }
}
