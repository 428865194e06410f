//! Operation task lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use skiff_core::{FileRef, FsAdapter, OperationKind, SchedConfig, SchedError, TransferError};

use crate::monitor::{ErrorMonitor, FaultSink};
use crate::scheduler::ControlMsg;

/// Unique identifier for a task within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an operation task.
///
/// `Ready` tasks have not been handed to the scheduler; `Scheduled` tasks
/// wait in a key queue; `Started` tasks were dispatched and asked to begin;
/// `Running` tasks have their adapter work in flight. The remaining three
/// states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Ready,
    Scheduled,
    Started,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Whether no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the task can still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether the task can be removed from a progress list.
    pub fn is_removable(&self) -> bool {
        self.is_terminal()
    }

    /// Whether the adapter work is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// The terminal outcome this state maps to, if any.
    pub fn outcome(&self) -> Option<TaskOutcome> {
        match self {
            Self::Completed => Some(TaskOutcome::Completed),
            Self::Failed => Some(TaskOutcome::Failed),
            Self::Cancelled => Some(TaskOutcome::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Scheduled => write!(f, "Scheduled"),
            Self::Started => write!(f, "Started"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Terminal outcome of a task, used for batch counting and caller results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl From<TaskOutcome> for TaskState {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Completed => Self::Completed,
            TaskOutcome::Failed => Self::Failed,
            TaskOutcome::Cancelled => Self::Cancelled,
        }
    }
}

/// One copy, move, or remove between a source and an optional destination.
///
/// The task owns its lifecycle state and delegates the byte-level work to
/// the injected adapter. Scheduling consumes the task by value, so a task
/// cannot be submitted twice.
pub struct TransferTask {
    id: TaskId,
    kind: OperationKind,
    source: FileRef,
    dest: Option<FileRef>,
    adapter: Arc<dyn FsAdapter>,
    state: watch::Sender<TaskState>,
    cancel: CancellationToken,
}

impl TransferTask {
    /// Create a task, validating that a destination is present exactly when
    /// the operation kind requires one.
    pub fn new(
        adapter: Arc<dyn FsAdapter>,
        kind: OperationKind,
        source: FileRef,
        dest: Option<FileRef>,
    ) -> Result<Self, SchedError> {
        if kind.requires_destination() && dest.is_none() {
            return Err(SchedError::MissingDestination { kind });
        }
        if !kind.requires_destination() && dest.is_some() {
            return Err(SchedError::UnexpectedDestination { kind });
        }
        Ok(Self::build(adapter, kind, source, dest))
    }

    /// Create a copy task.
    pub fn copy(adapter: Arc<dyn FsAdapter>, source: FileRef, dest: FileRef) -> Self {
        Self::build(adapter, OperationKind::Copy, source, Some(dest))
    }

    /// Create a move task.
    pub fn move_to(adapter: Arc<dyn FsAdapter>, source: FileRef, dest: FileRef) -> Self {
        Self::build(adapter, OperationKind::Move, source, Some(dest))
    }

    /// Create a remove task.
    pub fn remove(adapter: Arc<dyn FsAdapter>, source: FileRef) -> Self {
        Self::build(adapter, OperationKind::Remove, source, None)
    }

    fn build(
        adapter: Arc<dyn FsAdapter>,
        kind: OperationKind,
        source: FileRef,
        dest: Option<FileRef>,
    ) -> Self {
        let (state, _) = watch::channel(TaskState::Ready);
        Self {
            id: TaskId::next(),
            kind,
            source,
            dest,
            adapter,
            state,
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn source(&self) -> &FileRef {
        &self.source
    }

    pub fn dest(&self) -> Option<&FileRef> {
        self.dest.as_ref()
    }

    /// Human-readable description for progress lists.
    pub fn description(&self) -> String {
        match &self.dest {
            Some(dest) => format!("{} {} -> {}", self.kind, self.source, dest),
            None => format!("{} {}", self.kind, self.source),
        }
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.send_replace(state);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Build the caller-facing handle for this task.
    pub(crate) fn handle(&self, control: Option<mpsc::UnboundedSender<ControlMsg>>) -> TaskHandle {
        TaskHandle {
            id: self.id,
            kind: self.kind,
            description: self.description(),
            state: self.state.subscribe(),
            cancel: self.cancel.clone(),
            control,
        }
    }

    /// Run the operation to completion on this task's worker.
    ///
    /// Transitions `Started` → `Running`, issues the adapter call on the
    /// blocking pool, and races it against cancellation. The error monitor
    /// is started once work is in flight and torn down on every exit path,
    /// as is the adapter's connection resource.
    pub(crate) async fn execute(
        self,
        config: Arc<SchedConfig>,
        sink: Option<FaultSink>,
    ) -> TaskOutcome {
        self.set_state(TaskState::Started);
        tracing::debug!(task = %self.id, "starting {}", self.description());

        let adapter = Arc::clone(&self.adapter);
        let kind = self.kind;
        let source = self.source.clone();
        let dest = self.dest.clone();
        let work = tokio::task::spawn_blocking(move || match (kind, dest) {
            (OperationKind::Copy, Some(dest)) => adapter.copy(&source, &dest),
            (OperationKind::Move, Some(dest)) => adapter.move_to(&source, &dest),
            (OperationKind::Remove, _) => adapter.remove(&source),
            // destination presence is validated at construction
            (_, None) => Err(TransferError::Other {
                message: "missing destination".to_string(),
            }),
        });
        self.set_state(TaskState::Running);

        let monitor_stop = CancellationToken::new();
        let monitor = ErrorMonitor::new(
            self.id,
            Arc::clone(&self.adapter),
            self.cancel.clone(),
            sink,
            config.max_displayed_errors,
        );
        let monitor_join = monitor.spawn(
            monitor_stop.clone(),
            Duration::from_millis(config.error_poll_ms),
        );

        let outcome = tokio::select! {
            result = work => match result {
                Ok(Ok(true)) => TaskOutcome::Completed,
                Ok(Ok(false)) => {
                    tracing::warn!(task = %self.id, "{} failed", self.description());
                    TaskOutcome::Failed
                }
                Ok(Err(error)) => {
                    tracing::warn!(task = %self.id, %error, "{} failed", self.description());
                    TaskOutcome::Failed
                }
                Err(error) => {
                    tracing::warn!(task = %self.id, %error, "worker aborted");
                    TaskOutcome::Failed
                }
            },
            _ = self.cancel.cancelled() => TaskOutcome::Cancelled,
        };

        monitor_stop.cancel();
        let _ = monitor_join.await;
        self.adapter.close();
        self.set_state(outcome.into());
        outcome
    }
}

impl std::fmt::Debug for TransferTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTask")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("dest", &self.dest)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Caller-facing projection of a scheduled task.
///
/// Replaces the loose success/failure callbacks of a traditional engine with
/// an awaitable result: [`wait`](Self::wait) resolves exactly once, at the
/// task's terminal transition.
pub struct TaskHandle {
    id: TaskId,
    kind: OperationKind,
    description: String,
    state: watch::Receiver<TaskState>,
    cancel: CancellationToken,
    control: Option<mpsc::UnboundedSender<ControlMsg>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The task's current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    /// Whether the adapter work is in flight.
    pub fn is_busy(&self) -> bool {
        self.state().is_busy()
    }

    pub fn is_cancellable(&self) -> bool {
        self.state().is_cancellable()
    }

    pub fn is_removable(&self) -> bool {
        self.state().is_removable()
    }

    /// Request termination.
    ///
    /// A task still waiting in its key queue is removed without ever running;
    /// a running task has its adapter work interrupted. The key queue
    /// advances either way.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(control) = &self.control {
            let _ = control.send(ControlMsg::Cancel(self.id));
        }
    }

    /// Wait for the task's terminal outcome.
    pub async fn wait(&mut self) -> Result<TaskOutcome, SchedError> {
        loop {
            let state = *self.state.borrow_and_update();
            if let Some(outcome) = state.outcome() {
                return Ok(outcome);
            }
            self.state.changed().await.map_err(|_| SchedError::Closed)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAdapter;

    impl FsAdapter for NoopAdapter {
        fn copy(&self, _source: &FileRef, _dest: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
        fn move_to(&self, _source: &FileRef, _dest: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
        fn remove(&self, _source: &FileRef) -> Result<bool, TransferError> {
            Ok(true)
        }
    }

    fn adapter() -> Arc<dyn FsAdapter> {
        Arc::new(NoopAdapter)
    }

    #[test]
    fn test_copy_without_destination_is_rejected() {
        let result = TransferTask::new(adapter(), OperationKind::Copy, FileRef::local("/a"), None);
        assert!(matches!(
            result,
            Err(SchedError::MissingDestination {
                kind: OperationKind::Copy
            })
        ));
    }

    #[test]
    fn test_remove_with_destination_is_rejected() {
        let result = TransferTask::new(
            adapter(),
            OperationKind::Remove,
            FileRef::local("/a"),
            Some(FileRef::local("/b")),
        );
        assert!(matches!(
            result,
            Err(SchedError::UnexpectedDestination { .. })
        ));
    }

    #[test]
    fn test_state_projections() {
        assert!(TaskState::Scheduled.is_cancellable());
        assert!(!TaskState::Scheduled.is_removable());
        assert!(TaskState::Running.is_busy());
        assert!(TaskState::Completed.is_removable());
        assert!(!TaskState::Completed.is_cancellable());
        assert!(TaskState::Cancelled.is_terminal());
        assert_eq!(TaskState::Failed.outcome(), Some(TaskOutcome::Failed));
        assert_eq!(TaskState::Running.outcome(), None);
    }

    #[test]
    fn test_description() {
        let copy = TransferTask::copy(
            adapter(),
            FileRef::local("/a/x.txt"),
            FileRef::remote("/b/x.txt"),
        );
        assert_eq!(copy.description(), "Copy local:/a/x.txt -> remote:/b/x.txt");

        let remove = TransferTask::remove(adapter(), FileRef::remote("/b/x.txt"));
        assert_eq!(remove.description(), "Remove remote:/b/x.txt");
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = TransferTask::remove(adapter(), FileRef::local("/a"));
        let b = TransferTask::remove(adapter(), FileRef::local("/a"));
        assert_ne!(a.id(), b.id());
    }
}
