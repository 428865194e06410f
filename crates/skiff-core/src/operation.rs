//! File references and operation kinds.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The namespace a file lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// The local filesystem.
    Local,
    /// The remote filesystem reached over the transfer session.
    Remote,
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// An opaque handle to a file in one of the two namespaces.
///
/// A `FileRef` is the identity used both as an operation's source or
/// destination and as the scheduling key under which conflicting operations
/// are serialized. Path canonicalization happens before a `FileRef` is built;
/// two refs are the same file iff they compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    /// The namespace the path belongs to.
    pub namespace: Namespace,
    /// The (already canonicalized) path within the namespace.
    pub path: PathBuf,
}

impl FileRef {
    /// Create a reference to a local file.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: Namespace::Local,
            path: path.into(),
        }
    }

    /// Create a reference to a remote file.
    pub fn remote(path: impl Into<PathBuf>) -> Self {
        Self {
            namespace: Namespace::Remote,
            path: path.into(),
        }
    }

    /// The path component of the reference.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path.display())
    }
}

/// The action an operation task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Copy,
    Move,
    Remove,
}

impl OperationKind {
    /// Whether this kind of operation needs a destination.
    pub fn requires_destination(&self) -> bool {
        matches!(self, Self::Copy | Self::Move)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Remove => write!(f, "Remove"),
        }
    }
}

/// A non-fatal error surfaced by an adapter while an operation runs.
///
/// These do not fail the operation by themselves (e.g. one file among many
/// could not be read); they are drained and displayed by the error monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
}

impl OperationError {
    /// Create a new operation error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_identity() {
        let a = FileRef::local("/tmp/a");
        let b = FileRef::local("/tmp/a");
        let c = FileRef::remote("/tmp/a");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "local:/tmp/a");
        assert_eq!(c.to_string(), "remote:/tmp/a");
    }

    #[test]
    fn test_kind_requires_destination() {
        assert!(OperationKind::Copy.requires_destination());
        assert!(OperationKind::Move.requires_destination());
        assert!(!OperationKind::Remove.requires_destination());
    }
}
