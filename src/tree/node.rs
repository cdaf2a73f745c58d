//! Tree node representation

use crate::tree::path::{segment_key, SEPARATOR};
use std::collections::BTreeMap;

/// Whether a path names a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Directory,
}

/// A node of the content-addressed directory tree
///
/// `name` is the tagged path segment: directories end with `/`. Children are
/// keyed by the untagged segment, so a file and a directory with the same name
/// occupy the same slot, as they do on a real filesystem. Keeping them in a
/// `BTreeMap` gives the name-sorted order the directory hash depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub hash: String,
    pub name: String,
    pub children: BTreeMap<String, TreeNode>,
}

impl TreeNode {
    pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    /// Create an empty directory node; the tag is appended if missing
    pub fn directory(name: &str) -> Self {
        let mut tagged = name.to_string();
        if !tagged.ends_with(SEPARATOR) {
            tagged.push(SEPARATOR);
        }
        Self::new(String::new(), tagged)
    }

    pub fn is_dir(&self) -> bool {
        self.name.ends_with(SEPARATOR)
    }

    pub fn kind(&self) -> NodeKind {
        if self.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }

    /// Untagged name, the key this node is stored under in its parent
    pub fn key(&self) -> &str {
        segment_key(&self.name)
    }

    /// Number of nodes in this subtree, including this one
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(TreeNode::node_count).sum::<usize>()
    }

    /// Append the paths of every leaf below this node to `out`
    pub(crate) fn collect_leaves(&self, prefix: &str, out: &mut Vec<String>) {
        for child in self.children.values() {
            let path = format!("{}{}", prefix, child.name);
            if child.is_dir() {
                child.collect_leaves(&path, out);
            } else {
                out.push(path);
            }
        }
    }
}
