//! The filesystem adapter boundary.

use crate::error::TransferError;
use crate::operation::{FileRef, OperationError};

/// Byte-level file operations against one namespace pair.
///
/// One adapter is injected per task; the scheduler never branches on which
/// namespace an adapter reaches. Each call returns `Ok(true)` on success,
/// `Ok(false)` on a logical failure, or `Err` when the adapter itself broke;
/// the task treats the last two identically.
///
/// While an operation runs the adapter may surface non-fatal per-file errors
/// through [`next_operation_error`](Self::next_operation_error); these are
/// drained by the task's error monitor rather than failing the operation.
pub trait FsAdapter: Send + Sync {
    /// Copy `source` to `dest`.
    fn copy(&self, source: &FileRef, dest: &FileRef) -> Result<bool, TransferError>;

    /// Move `source` to `dest`.
    fn move_to(&self, source: &FileRef, dest: &FileRef) -> Result<bool, TransferError>;

    /// Remove `source`.
    fn remove(&self, source: &FileRef) -> Result<bool, TransferError>;

    /// Whether the non-fatal error stream has a queued entry.
    fn has_next_operation_error(&self) -> bool {
        false
    }

    /// Pop the next queued non-fatal error, if any.
    fn next_operation_error(&self) -> Option<OperationError> {
        None
    }

    /// Release any connection resource the adapter lazily opened.
    ///
    /// Called exactly once per task, on every terminal transition. The
    /// connection is owned by a single task and never shared.
    fn close(&self) {}
}
