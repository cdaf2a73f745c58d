//! Recursive comparison of two trees
//!
//! The diff walks both trees in lockstep, pairing children by name. Children are
//! visited in ascending key order, so a pass over unchanged trees always emits the
//! same sequence. Directory hashes cover child hashes but not child names, so two
//! directories with equal hashes can still differ by a rename; every directory is
//! descended.
//!
//! Per child name:
//! - only in `current`: `Added` for it, or for every leaf below it
//! - both directories: recurse
//! - both files: `Modified` when the hashes differ
//! - file on one side, directory on the other: `Modified` for the current path
//! - only in `other`: `Removed` for it, or for every leaf below it

use crate::error::SyncError;
use crate::tree::builder::Tree;
use crate::tree::node::TreeNode;
use std::collections::BTreeSet;
use std::fmt;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiffKind::Added => "added",
            DiffKind::Removed => "removed",
            DiffKind::Modified => "modified",
        };
        f.write_str(label)
    }
}

/// One change between two trees
///
/// `path` is relative to the tree root. A path ending in `/` names a directory,
/// which only happens for a type change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeDiff {
    pub kind: DiffKind,
    pub path: String,
}

impl TreeDiff {
    pub fn new(kind: DiffKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.path.ends_with(crate::tree::path::SEPARATOR)
    }
}

impl fmt::Display for TreeDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

impl Tree {
    /// Compare this tree against `other`, handing each change to `emit`
    ///
    /// Returns [`SyncError::Cancelled`] as soon as `cancel` fires; every record
    /// passed to `emit` before that point is complete.
    pub fn diff_with<F>(
        &self,
        other: &Tree,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> Result<(), SyncError>
    where
        F: FnMut(TreeDiff),
    {
        diff_directories(self.root(), other.root(), "", cancel, &mut emit)
    }

    /// Compare this tree against `other` and collect the changes
    pub fn diff(&self, other: &Tree, cancel: &CancellationToken) -> Result<Vec<TreeDiff>, SyncError> {
        let mut diffs = Vec::new();
        self.diff_with(other, cancel, |diff| diffs.push(diff))?;
        Ok(diffs)
    }
}

fn diff_directories(
    current: &TreeNode,
    other: &TreeNode,
    prefix: &str,
    cancel: &CancellationToken,
    emit: &mut dyn FnMut(TreeDiff),
) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }

    let keys: BTreeSet<&str> = current
        .children
        .keys()
        .chain(other.children.keys())
        .map(String::as_str)
        .collect();

    for key in keys {
        match (current.children.get(key), other.children.get(key)) {
            (Some(node), None) => emit_subtree(node, prefix, DiffKind::Added, cancel, emit)?,
            (None, Some(node)) => emit_subtree(node, prefix, DiffKind::Removed, cancel, emit)?,
            (Some(ours), Some(theirs)) => {
                let path = format!("{}{}", prefix, ours.name);
                match (ours.is_dir(), theirs.is_dir()) {
                    (true, true) => diff_directories(ours, theirs, &path, cancel, emit)?,
                    (false, false) if ours.hash == theirs.hash => {}
                    _ => emit_one(TreeDiff::new(DiffKind::Modified, path), cancel, emit)?,
                }
            }
            (None, None) => {}
        }
    }
    Ok(())
}

fn emit_subtree(
    node: &TreeNode,
    prefix: &str,
    kind: DiffKind,
    cancel: &CancellationToken,
    emit: &mut dyn FnMut(TreeDiff),
) -> Result<(), SyncError> {
    let path = format!("{}{}", prefix, node.name);
    if !node.is_dir() {
        return emit_one(TreeDiff::new(kind, path), cancel, emit);
    }

    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    for child in node.children.values() {
        emit_subtree(child, &path, kind, cancel, emit)?;
    }
    Ok(())
}

fn emit_one(
    diff: TreeDiff,
    cancel: &CancellationToken,
    emit: &mut dyn FnMut(TreeDiff),
) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    emit(diff);
    Ok(())
}
