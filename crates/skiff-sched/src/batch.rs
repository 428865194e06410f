//! Batch aggregation of tasks sharing one destination and operation kind.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use skiff_core::{FileRef, OperationKind, SchedError};

use crate::scheduler::Scheduler;
use crate::task::{TaskHandle, TransferTask};

/// A group of tasks issued as one logical operation.
///
/// Members accumulate through [`bundle`](Self::bundle) and are submitted to
/// the scheduler together by [`activate`](Self::activate), after which the
/// batch is sealed. All members must share the batch's operation kind and
/// one destination; the first bundled task establishes it.
pub struct Batch {
    kind: OperationKind,
    dest: Option<FileRef>,
    members: Vec<TransferTask>,
    activated: bool,
}

impl Batch {
    /// Create an empty batch for one operation kind.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            dest: None,
            members: Vec::new(),
            activated: false,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Number of bundled members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member task.
    ///
    /// Rejects tasks of another kind or with another destination; a rejected
    /// task leaves the member set unchanged. Rejects everything once the
    /// batch is activated.
    pub fn bundle(&mut self, task: TransferTask) -> Result<(), SchedError> {
        if self.activated {
            return Err(SchedError::BatchSealed);
        }
        if task.kind() != self.kind {
            return Err(SchedError::KindMismatch {
                expected: self.kind,
                found: task.kind(),
            });
        }
        if self.members.is_empty() {
            self.dest = task.dest().cloned();
        } else if let Some(expected) = &self.dest {
            if task.dest() != Some(expected) {
                return Err(SchedError::DestinationMismatch {
                    expected: expected.clone(),
                });
            }
        }
        self.members.push(task);
        Ok(())
    }

    /// Seal the batch and submit every member to the scheduler, in bundle
    /// order.
    ///
    /// Exactly one [`BatchSummary`] is emitted once every member reaches a
    /// terminal state. Activating twice, or bundling afterwards, is a
    /// configuration error.
    pub fn activate(&mut self, scheduler: &Scheduler) -> Result<BatchHandle, SchedError> {
        if self.activated {
            return Err(SchedError::BatchSealed);
        }
        if self.members.is_empty() {
            return Err(SchedError::EmptyBatch);
        }
        self.activated = true;
        let members = std::mem::take(&mut self.members);
        let (summary_tx, summary_rx) = oneshot::channel();
        let tasks = scheduler.activate(self.kind, members, summary_tx)?;
        Ok(BatchHandle {
            tasks,
            summary: summary_rx,
        })
    }
}

/// Caller-facing view of an activated batch.
pub struct BatchHandle {
    tasks: Vec<TaskHandle>,
    summary: oneshot::Receiver<BatchSummary>,
}

impl BatchHandle {
    /// Handles for the member tasks, in bundle order.
    pub fn tasks(&self) -> &[TaskHandle] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [TaskHandle] {
        &mut self.tasks
    }

    /// Wait for the batch's single aggregate summary.
    pub async fn summary(self) -> Result<BatchSummary, SchedError> {
        self.summary.await.map_err(|_| SchedError::Closed)
    }
}

/// Aggregate outcome of a finished batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub kind: OperationKind,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    /// Whether every member completed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }

    /// Get a human-readable summary of the batch.
    pub fn summary(&self) -> String {
        let action = match self.kind {
            OperationKind::Copy => "Copied",
            OperationKind::Move => "Moved",
            OperationKind::Remove => "Removed",
        };

        if self.is_success() {
            format!("{} {} items", action, self.completed)
        } else {
            format!(
                "{} {} of {} items, {} failed, {} cancelled",
                action, self.completed, self.total, self.failed, self.cancelled
            )
        }
    }
}
