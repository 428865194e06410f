//! Background operation scheduler and coordinator for skiff.
//!
//! This crate decides whether a requested file operation may run immediately
//! or must wait behind a conflicting one, tracks each operation's lifecycle,
//! aggregates outcomes for operations issued as one logical batch, and cuts
//! an operation off early when its adapter produces a sustained stream of
//! non-fatal errors.
//!
//! The actual byte-level work is delegated to an injected
//! [`FsAdapter`](skiff_core::FsAdapter); presentation, path handling, and the
//! transfer protocol live outside this crate.

mod batch;
mod conflict;
mod monitor;
mod scheduler;
mod task;

pub use batch::{Batch, BatchHandle, BatchSummary};
pub use monitor::{ErrorMonitor, FaultSink, TaskFault};
pub use scheduler::Scheduler;
pub use task::{TaskHandle, TaskId, TaskOutcome, TaskState, TransferTask};
