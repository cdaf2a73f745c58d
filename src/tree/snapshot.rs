//! JSON snapshot of a tree
//!
//! Shape: `{ "<root name>": { "name": ..., "hash": ..., "Children": { "<name>": ... } } }`
//! with child names carrying their directory tag. Snapshots are written to a
//! sibling temp file, synced, then renamed over the target, so a crash mid-write
//! leaves the previous snapshot in place.

use crate::error::StorageError;
use crate::tree::builder::{root_name_for, Tree};
use crate::tree::node::TreeNode;
use crate::tree::path::{segment_key, SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotNode {
    name: String,
    hash: String,
    #[serde(rename = "Children", default)]
    children: BTreeMap<String, SnapshotNode>,
}

impl SnapshotNode {
    fn from_node(node: &TreeNode) -> Self {
        Self {
            name: node.name.clone(),
            hash: node.hash.clone(),
            children: node
                .children
                .values()
                .map(|child| (child.name.clone(), Self::from_node(child)))
                .collect(),
        }
    }

    fn into_node(self) -> TreeNode {
        let mut node = TreeNode::new(self.hash, self.name);
        if !node.is_dir() {
            return node;
        }
        for (_, child) in self.children {
            let key = segment_key(&child.name).to_string();
            if key.is_empty() || key.contains(SEPARATOR) {
                warn!(name = %child.name, "Dropping snapshot node with invalid name");
                continue;
            }
            node.children.insert(key, child.into_node());
        }
        node
    }
}

impl Tree {
    /// Encode the tree as snapshot JSON
    pub fn to_snapshot_bytes(&self) -> Result<Vec<u8>, StorageError> {
        let mut document = BTreeMap::new();
        document.insert(self.root().name.clone(), SnapshotNode::from_node(self.root()));
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// Decode snapshot JSON into a tree anchored at `base`
    ///
    /// Malformed JSON is an error. A document without an entry for this base's
    /// root name decodes to an empty tree. Directory hashes are recomputed.
    pub fn from_snapshot_bytes(base: PathBuf, bytes: &[u8]) -> Result<Tree, StorageError> {
        let mut document: BTreeMap<String, SnapshotNode> = serde_json::from_slice(bytes)?;
        let root_name = root_name_for(&base);

        let Some(mut root) = document.remove(&root_name) else {
            warn!(root = %root_name, "Snapshot has no entry for this root, starting empty");
            return Ok(Tree::new(base));
        };

        root.name = root_name;
        let mut tree = Tree::from_root(base, root.into_node());
        tree.recompute_hashes();
        Ok(tree)
    }

    /// Persist the tree to `path` using write-then-replace
    pub fn save_snapshot(&self, path: &Path) -> Result<(), StorageError> {
        let bytes = self.to_snapshot_bytes()?;
        write_atomic(path, &bytes)
    }

    /// Load a snapshot, treating a missing or unreadable file as an empty tree
    pub fn load_snapshot(base: PathBuf, path: &Path) -> Tree {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No snapshot found, starting empty");
                return Tree::new(base);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read snapshot, starting empty");
                return Tree::new(base);
            }
        };

        match Tree::from_snapshot_bytes(base.clone(), &bytes) {
            Ok(tree) => {
                info!(
                    path = %path.display(),
                    files = tree.leaf_paths().len(),
                    root_hash = %tree.root_hash(),
                    "Loaded snapshot"
                );
                tree
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Snapshot is malformed, starting empty");
                Tree::new(base)
            }
        }
    }
}

/// Write `bytes` to a temp file beside `path`, sync it, then rename it over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let file_name = path.file_name().ok_or_else(|| {
        StorageError::InvalidPath(format!("Snapshot path has no file name: {}", path.display()))
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::IoError(e));
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Wrote snapshot");
    Ok(())
}
