//! Scheduling-key computation for conflicting operations.
//!
//! Two operations conflict when they touch the same file from either side,
//! as source or destination of either one. A conflicting newcomer is keyed
//! to the earliest registered task's source so that the whole chain
//! serializes in FIFO order rooted at the original operation.

use skiff_core::FileRef;

/// Compute the scheduling key for a new operation.
///
/// `registered` is the set of operations currently known to the scheduler,
/// as `(source, destination)` pairs in registration order. The rules are
/// tried in order and each scans the registry front to back, so the earliest
/// conflicting task wins:
///
/// 1. some registered source equals `source`: key is `source`;
/// 2. `dest` equals some registered source: key is that source;
/// 3. `source` equals some registered destination: key is that task's source;
/// 4. `dest` equals some registered destination: key is that task's source.
///
/// With no match the operation gets its own source as key.
pub(crate) fn resolve_key(
    source: &FileRef,
    dest: Option<&FileRef>,
    registered: &[(&FileRef, Option<&FileRef>)],
) -> FileRef {
    if registered.iter().any(|&(other, _)| other == source) {
        return source.clone();
    }
    if let Some(dest) = dest {
        if let Some(&(other, _)) = registered.iter().find(|&&(other, _)| other == dest) {
            return other.clone();
        }
    }
    if let Some(&(other, _)) = registered
        .iter()
        .find(|&&(_, other_dest)| other_dest == Some(source))
    {
        return other.clone();
    }
    if let Some(dest) = dest {
        if let Some(&(other, _)) = registered
            .iter()
            .find(|&&(_, other_dest)| other_dest == Some(dest))
        {
            return other.clone();
        }
    }
    source.clone()
}
