//! Keyed mutual-exclusion scheduling and the control loop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};

use skiff_core::{FileRef, OperationKind, SchedConfig, SchedError};

use crate::batch::BatchSummary;
use crate::conflict;
use crate::monitor::FaultSink;
use crate::task::{TaskHandle, TaskId, TaskOutcome, TaskState, TransferTask};

/// Messages serialized onto the control loop.
///
/// The key queues, the task registry, and all batch counters are owned by a
/// single spawned loop; everything that mutates them arrives here.
pub(crate) enum ControlMsg {
    Schedule {
        task: TransferTask,
        control: mpsc::UnboundedSender<ControlMsg>,
    },
    Activate {
        kind: OperationKind,
        members: Vec<TransferTask>,
        summary: oneshot::Sender<BatchSummary>,
        control: mpsc::UnboundedSender<ControlMsg>,
    },
    Cancel(TaskId),
    Finished {
        id: TaskId,
        outcome: TaskOutcome,
    },
}

/// Handle to one scheduler instance.
///
/// Each instance owns its queues; independent schedulers do not interact.
/// Cloning the handle shares the instance.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<ControlMsg>,
    config: Arc<SchedConfig>,
    sink: Option<FaultSink>,
}

impl Scheduler {
    /// Spawn a scheduler with its own control loop.
    pub fn new(config: SchedConfig) -> Self {
        Self::build(config, None)
    }

    /// Spawn a scheduler whose error monitors display faults into `sink`.
    pub fn with_fault_sink(config: SchedConfig, sink: FaultSink) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: SchedConfig, sink: Option<FaultSink>) -> Self {
        let config = Arc::new(config);
        let (tx, rx) = mpsc::unbounded_channel();
        let control = ControlLoop {
            config: Arc::clone(&config),
            sink: sink.clone(),
            queues: HashMap::new(),
            registry: IndexMap::new(),
            batches: HashMap::new(),
            next_batch: 1,
        };
        tokio::spawn(control.run(rx));
        Self { tx, config, sink }
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Register a task for conflict-aware execution.
    ///
    /// The task runs immediately if nothing conflicting is scheduled,
    /// otherwise it waits its turn behind its key's predecessors. There is
    /// no timeout on that wait: a predecessor that never finishes starves
    /// the queue behind it.
    pub fn schedule(&self, task: TransferTask) -> Result<TaskHandle, SchedError> {
        let handle = task.handle(Some(self.tx.clone()));
        self.tx
            .send(ControlMsg::Schedule {
                task,
                control: self.tx.clone(),
            })
            .map_err(|_| SchedError::Closed)?;
        Ok(handle)
    }

    /// Run a task immediately, bypassing conflict resolution.
    ///
    /// Prefer [`schedule`](Self::schedule): a task started this way is never
    /// registered, so later conflict computations cannot see it.
    pub fn start_unqueued(&self, task: TransferTask) -> TaskHandle {
        let handle = task.handle(None);
        let config = Arc::clone(&self.config);
        let sink = self.sink.clone();
        tracing::debug!(task = %task.id(), "starting unqueued {}", task.description());
        tokio::spawn(async move {
            task.execute(config, sink).await;
        });
        handle
    }

    /// Submit an activated batch's members, returning their handles in
    /// bundle order.
    pub(crate) fn activate(
        &self,
        kind: OperationKind,
        members: Vec<TransferTask>,
        summary: oneshot::Sender<BatchSummary>,
    ) -> Result<Vec<TaskHandle>, SchedError> {
        let handles = members
            .iter()
            .map(|task| task.handle(Some(self.tx.clone())))
            .collect();
        self.tx
            .send(ControlMsg::Activate {
                kind,
                members,
                summary,
                control: self.tx.clone(),
            })
            .map_err(|_| SchedError::Closed)?;
        Ok(handles)
    }
}

type BatchId = u64;

/// A registered task: queued or running under its key until terminal.
struct Registered {
    source: FileRef,
    dest: Option<FileRef>,
    key: FileRef,
    batch: Option<BatchId>,
    control: mpsc::UnboundedSender<ControlMsg>,
    /// Present while the task waits in its key queue; taken at dispatch.
    pending: Option<TransferTask>,
}

#[derive(Default)]
struct KeyQueue {
    running: Option<TaskId>,
    waiting: VecDeque<TaskId>,
}

struct BatchState {
    kind: OperationKind,
    total: usize,
    completed: usize,
    failed: usize,
    cancelled: usize,
    pending: usize,
    summary: Option<oneshot::Sender<BatchSummary>>,
}

struct ControlLoop {
    config: Arc<SchedConfig>,
    sink: Option<FaultSink>,
    queues: HashMap<FileRef, KeyQueue>,
    /// All registered tasks, in registration order.
    registry: IndexMap<TaskId, Registered>,
    batches: HashMap<BatchId, BatchState>,
    next_batch: BatchId,
}

impl ControlLoop {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ControlMsg>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        tracing::debug!("scheduler control loop stopped");
    }

    fn handle(&mut self, msg: ControlMsg) {
        match msg {
            ControlMsg::Schedule { task, control } => {
                self.admit(task, None, control);
            }
            ControlMsg::Activate {
                kind,
                members,
                summary,
                control,
            } => {
                let id = self.next_batch;
                self.next_batch += 1;
                self.batches.insert(
                    id,
                    BatchState {
                        kind,
                        total: members.len(),
                        completed: 0,
                        failed: 0,
                        cancelled: 0,
                        pending: members.len(),
                        summary: Some(summary),
                    },
                );
                tracing::debug!(batch = id, members = members.len(), "batch activated");
                for task in members {
                    self.admit(task, Some(id), control.clone());
                }
            }
            ControlMsg::Cancel(id) => {
                // Only queued tasks need scheduler-side cancellation; a
                // running task winds down via its own token and reports
                // Finished like any other.
                let queued = self
                    .registry
                    .get_mut(&id)
                    .and_then(|reg| reg.pending.take());
                if let Some(task) = queued {
                    task.set_state(TaskState::Cancelled);
                    self.conclude(id, TaskOutcome::Cancelled);
                }
            }
            ControlMsg::Finished { id, outcome } => {
                self.conclude(id, outcome);
            }
        }
    }

    /// Register a task under its conflict key and dispatch if possible.
    fn admit(
        &mut self,
        task: TransferTask,
        batch: Option<BatchId>,
        control: mpsc::UnboundedSender<ControlMsg>,
    ) {
        let key = {
            let registered: Vec<(&FileRef, Option<&FileRef>)> = self
                .registry
                .values()
                .map(|reg| (&reg.source, reg.dest.as_ref()))
                .collect();
            conflict::resolve_key(task.source(), task.dest(), &registered)
        };
        let id = task.id();
        task.set_state(TaskState::Scheduled);
        tracing::debug!(task = %id, key = %key, "scheduled {}", task.description());
        self.registry.insert(
            id,
            Registered {
                source: task.source().clone(),
                dest: task.dest().cloned(),
                key: key.clone(),
                batch,
                control,
                pending: Some(task),
            },
        );
        self.queues
            .entry(key.clone())
            .or_default()
            .waiting
            .push_back(id);
        self.dispatch(&key);
    }

    /// Start the next waiting task for `key`, if nothing runs under it.
    fn dispatch(&mut self, key: &FileRef) {
        loop {
            let next = {
                let Some(queue) = self.queues.get_mut(key) else {
                    return;
                };
                if queue.running.is_some() {
                    return;
                }
                match queue.waiting.pop_front() {
                    Some(id) => id,
                    None => {
                        self.queues.remove(key);
                        return;
                    }
                }
            };

            let task = self
                .registry
                .get_mut(&next)
                .and_then(|reg| reg.pending.take());
            let Some(task) = task else {
                continue;
            };
            if task.is_cancelled() {
                // cancelled while queued; never runs
                task.set_state(TaskState::Cancelled);
                self.conclude(next, TaskOutcome::Cancelled);
                continue;
            }

            if let Some(queue) = self.queues.get_mut(key) {
                queue.running = Some(next);
            }
            let control = self
                .registry
                .get(&next)
                .map(|reg| reg.control.clone());
            let config = Arc::clone(&self.config);
            let sink = self.sink.clone();
            tracing::debug!(task = %next, key = %key, "dispatching");
            tokio::spawn(async move {
                let outcome = task.execute(config, sink).await;
                if let Some(control) = control {
                    let _ = control.send(ControlMsg::Finished { id: next, outcome });
                }
            });
            return;
        }
    }

    /// Retire a finished task: batch accounting, registry removal, and
    /// advancing its key queue. Failure and cancellation advance the queue
    /// the same way completion does.
    fn conclude(&mut self, id: TaskId, outcome: TaskOutcome) {
        let Some(reg) = self.registry.shift_remove(&id) else {
            return;
        };
        tracing::debug!(task = %id, outcome = ?outcome, "task finished");
        if let Some(batch) = reg.batch {
            self.notify_batch(batch, outcome);
        }

        let mut advance = false;
        if let Some(queue) = self.queues.get_mut(&reg.key) {
            if queue.running == Some(id) {
                queue.running = None;
                advance = true;
            } else {
                queue.waiting.retain(|waiting| *waiting != id);
            }
            if queue.running.is_none() && queue.waiting.is_empty() {
                self.queues.remove(&reg.key);
                advance = false;
            }
        }
        if advance {
            self.dispatch(&reg.key);
        }
    }

    /// Count one member outcome; emit the summary when the last member
    /// finishes.
    fn notify_batch(&mut self, id: BatchId, outcome: TaskOutcome) {
        let Some(batch) = self.batches.get_mut(&id) else {
            return;
        };
        match outcome {
            TaskOutcome::Completed => batch.completed += 1,
            TaskOutcome::Failed => batch.failed += 1,
            TaskOutcome::Cancelled => batch.cancelled += 1,
        }
        batch.pending -= 1;
        if batch.pending > 0 {
            return;
        }

        let Some(mut batch) = self.batches.remove(&id) else {
            return;
        };
        let summary = BatchSummary {
            kind: batch.kind,
            total: batch.total,
            completed: batch.completed,
            failed: batch.failed,
            cancelled: batch.cancelled,
        };
        tracing::info!(batch = id, "{}", summary.summary());
        if let Some(tx) = batch.summary.take() {
            let _ = tx.send(summary);
        }
    }
}
