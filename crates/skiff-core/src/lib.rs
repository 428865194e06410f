//! Core types and traits for skiff.
//!
//! This crate provides the fundamental data structures shared across the
//! skiff transfer engine: file references spanning the local and remote
//! namespaces, operation kinds, the filesystem adapter boundary, and the
//! error and configuration types.

mod adapter;
mod config;
mod error;
mod operation;

pub use adapter::FsAdapter;
pub use config::{SchedConfig, SchedConfigBuilder};
pub use error::{SchedError, TransferError};
pub use operation::{FileRef, Namespace, OperationError, OperationKind};
