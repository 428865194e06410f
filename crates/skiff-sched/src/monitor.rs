//! Per-task monitoring of the adapter's non-fatal error stream.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use skiff_core::{FsAdapter, OperationError};

use crate::task::TaskId;

/// Channel the monitor displays faults through; the receiving end belongs to
/// the presentation layer.
pub type FaultSink = mpsc::UnboundedSender<TaskFault>;

/// A displayed non-fatal error, attributed to its task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFault {
    pub task: TaskId,
    pub error: OperationError,
}

/// Watches one task's non-fatal error stream while the task runs.
///
/// Each drained error is displayed up to a configured maximum; one more and
/// the stream is treated as systemic: the monitor stops draining and
/// force-cancels its owning task, exactly once.
pub struct ErrorMonitor {
    task: TaskId,
    adapter: Arc<dyn FsAdapter>,
    task_cancel: CancellationToken,
    sink: Option<FaultSink>,
    max_displayed: usize,
    displayed: usize,
    flooded: bool,
    finished: bool,
}

impl ErrorMonitor {
    pub fn new(
        task: TaskId,
        adapter: Arc<dyn FsAdapter>,
        task_cancel: CancellationToken,
        sink: Option<FaultSink>,
        max_displayed: usize,
    ) -> Self {
        Self {
            task,
            adapter,
            task_cancel,
            sink,
            max_displayed,
            displayed: 0,
            flooded: false,
            finished: false,
        }
    }

    /// Drain every queued error.
    ///
    /// Returns `true` once the error limit has been exceeded; after that the
    /// monitor is inert and the owning task's cancellation has been
    /// requested.
    pub fn drain(&mut self) -> bool {
        if self.finished {
            return self.flooded;
        }
        while self.adapter.has_next_operation_error() {
            let Some(error) = self.adapter.next_operation_error() else {
                break;
            };
            if self.displayed < self.max_displayed {
                self.display(error);
            } else {
                self.flooded = true;
                self.finished = true;
                tracing::warn!(task = %self.task, "too many errors, cancelling task");
                self.task_cancel.cancel();
                return true;
            }
        }
        false
    }

    /// Drain and display whatever is still queued, then stop for good.
    ///
    /// Safe to call multiple times; a no-op after the first call and after a
    /// flood.
    pub fn cancel(&mut self) {
        if self.finished {
            return;
        }
        while self.displayed < self.max_displayed && self.adapter.has_next_operation_error() {
            let Some(error) = self.adapter.next_operation_error() else {
                break;
            };
            self.display(error);
        }
        self.finished = true;
    }

    /// Number of errors displayed so far.
    pub fn displayed(&self) -> usize {
        self.displayed
    }

    /// Whether the error limit was exceeded.
    pub fn is_flooded(&self) -> bool {
        self.flooded
    }

    /// Whether the monitor has stopped draining.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn display(&mut self, error: OperationError) {
        self.displayed += 1;
        match &self.sink {
            Some(sink) => {
                let _ = sink.send(TaskFault {
                    task: self.task,
                    error,
                });
            }
            None => tracing::warn!(task = %self.task, "{error}"),
        }
    }

    /// Drive the monitor on a polling loop until `stop` fires or the error
    /// limit is exceeded.
    pub(crate) fn spawn(mut self, stop: CancellationToken, poll: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        self.cancel();
                        break;
                    }
                    _ = ticker.tick() => {
                        if self.drain() {
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use skiff_core::{FileRef, TransferError};

    use super::*;

    struct QueueAdapter {
        errors: Mutex<VecDeque<OperationError>>,
    }

    impl QueueAdapter {
        fn with_errors(count: usize) -> Arc<Self> {
            let errors = (0..count)
                .map(|i| OperationError::new(format!("/file-{i}"), "transfer failed"))
                .collect();
            Arc::new(Self {
                errors: Mutex::new(errors),
            })
        }
    }

    impl FsAdapter for QueueAdapter {
        fn copy(&self, _source: &FileRef, _dest: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
        fn move_to(&self, _source: &FileRef, _dest: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
        fn remove(&self, _source: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
        fn has_next_operation_error(&self) -> bool {
            !self.errors.lock().unwrap().is_empty()
        }
        fn next_operation_error(&self) -> Option<OperationError> {
            self.errors.lock().unwrap().pop_front()
        }
    }

    fn monitor(adapter: Arc<QueueAdapter>, max: usize) -> (ErrorMonitor, mpsc::UnboundedReceiver<TaskFault>, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let monitor = ErrorMonitor::new(TaskId(1), adapter, token.clone(), Some(tx), max);
        (monitor, rx, token)
    }

    #[test]
    fn test_errors_below_limit_are_all_displayed() {
        let adapter = QueueAdapter::with_errors(3);
        let (mut monitor, mut rx, token) = monitor(adapter, 5);

        assert!(!monitor.drain());
        assert_eq!(monitor.displayed(), 3);
        assert!(!token.is_cancelled());

        let mut seen = 0;
        while rx.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_one_over_limit_displays_max_and_cancels() {
        let max = 4;
        let adapter = QueueAdapter::with_errors(max + 1);
        let (mut monitor, mut rx, token) = monitor(adapter, max);

        assert!(monitor.drain());
        assert_eq!(monitor.displayed(), max);
        assert!(monitor.is_flooded());
        assert!(token.is_cancelled());

        let mut seen = 0;
        while rx.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, max);

        // inert after the flood
        assert!(monitor.drain());
        assert_eq!(monitor.displayed(), max);
    }

    #[test]
    fn test_cancel_drains_remaining_and_is_idempotent() {
        let adapter = QueueAdapter::with_errors(2);
        let (mut monitor, mut rx, token) = monitor(Arc::clone(&adapter), 5);

        monitor.cancel();
        assert!(monitor.is_finished());
        assert_eq!(monitor.displayed(), 2);
        assert!(!token.is_cancelled());

        // second call is a no-op even with more errors queued
        adapter
            .errors
            .lock()
            .unwrap()
            .push_back(OperationError::new("/late", "ignored"));
        monitor.cancel();
        assert_eq!(monitor.displayed(), 2);

        let mut seen = 0;
        while rx.try_recv().is_ok() {
            seen += 1;
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_cancel_after_flood_does_not_drain() {
        let adapter = QueueAdapter::with_errors(3);
        let (mut monitor, _rx, _token) = monitor(Arc::clone(&adapter), 1);

        assert!(monitor.drain());
        let remaining = adapter.errors.lock().unwrap().len();
        monitor.cancel();
        assert_eq!(adapter.errors.lock().unwrap().len(), remaining);
    }
}
