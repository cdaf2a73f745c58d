//! In-memory content-addressed tree and its filesystem builder

use crate::error::StorageError;
use crate::tree::hasher;
use crate::tree::node::{NodeKind, TreeNode};
use crate::tree::path::{relative_path_string, segment_key, split_path, SEPARATOR};
use crate::tree::walker::{Entry, Walker, WalkerConfig};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

/// A tree shared between the watcher and the synchronizer
///
/// One exclusive lock per tree: every mutation and every diff holds it for the
/// whole operation, so readers never observe a half-applied change.
pub type SharedTree = Arc<Mutex<Tree>>;

/// Content-addressed directory tree anchored at a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: TreeNode,
    base: PathBuf,
}

impl Tree {
    /// Create an empty tree for `base`
    pub fn new(base: PathBuf) -> Self {
        let root = TreeNode::directory(&root_name_for(&base));
        Self { root, base }
    }

    pub(crate) fn from_root(base: PathBuf, root: TreeNode) -> Self {
        Self { root, base }
    }

    /// Wrap this tree for sharing between tasks
    pub fn into_shared(self) -> SharedTree {
        Arc::new(Mutex::new(self))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Root hash; empty when the tree holds no files
    pub fn root_hash(&self) -> &str {
        &self.root.hash
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Insert or update `path`, then roll hashes up to the root
    ///
    /// With `Some(content)` the final segment becomes a leaf hashed from the
    /// bytes; with `None` it becomes a directory. A node of the other kind at
    /// the same position is replaced.
    pub fn add_or_update(&mut self, path: &str, content: Option<&[u8]>) {
        if self.insert(path, content) {
            self.recompute_hashes();
        }
    }

    /// Insert without rolling hashes up
    pub(crate) fn insert(&mut self, path: &str, content: Option<&[u8]>) -> bool {
        let kind = match content {
            Some(_) => NodeKind::File,
            None => NodeKind::Directory,
        };
        let segments = split_path(path, kind);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let mut current = &mut self.root;
        for segment in parents {
            let child = current
                .children
                .entry(segment_key(segment).to_string())
                .or_insert_with(|| TreeNode::directory(segment));
            if !child.is_dir() {
                trace!(segment = %segment, "Replacing file with directory");
                *child = TreeNode::directory(segment);
            }
            current = child;
        }

        let key = segment_key(last).to_string();
        match content {
            Some(bytes) => {
                let leaf = TreeNode::new(hasher::compute_content_hash(bytes), last.clone());
                current.children.insert(key, leaf);
            }
            None => {
                let child = current
                    .children
                    .entry(key)
                    .or_insert_with(|| TreeNode::directory(last));
                if !child.is_dir() {
                    *child = TreeNode::directory(last);
                }
            }
        }
        true
    }

    /// Detach the node at `path` and roll hashes up
    ///
    /// A path that does not resolve is a no-op. Returns whether a node was removed.
    pub fn remove(&mut self, path: &str) -> bool {
        let segments = split_path(path, NodeKind::File);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let mut current = &mut self.root;
        for segment in parents {
            current = match current.children.get_mut(segment_key(segment)) {
                Some(child) if child.is_dir() => child,
                _ => return false,
            };
        }

        let removed = current.children.remove(segment_key(last)).is_some();
        if removed {
            self.recompute_hashes();
        }
        removed
    }

    /// Recompute every directory hash bottom-up, pruning empty directories
    ///
    /// The root is never pruned; an empty root has an empty hash.
    pub fn recompute_hashes(&mut self) {
        rollup(&mut self.root);
    }

    /// Look up the node at `path`, ignoring directory tags
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let mut current = &self.root;
        for segment in split_path(path, NodeKind::File) {
            if !current.is_dir() {
                return None;
            }
            current = current.children.get(segment_key(&segment))?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        !split_path(path, NodeKind::File).is_empty() && self.get(path).is_some()
    }

    /// Every file path in the tree, sorted
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_leaves("", &mut out);
        out.sort();
        out
    }

    /// Number of nodes including the root
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }
}

fn rollup(node: &mut TreeNode) {
    for child in node.children.values_mut() {
        if child.is_dir() {
            rollup(child);
        }
    }
    node.children
        .retain(|_, child| !child.is_dir() || !child.children.is_empty());

    node.hash = if node.children.is_empty() {
        String::new()
    } else {
        hasher::compute_directory_hash(node.children.values().map(|c| c.hash.as_str()))
    };
}

/// Root segment name for a base directory, tagged as a directory
pub fn root_name_for(base: &Path) -> String {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}{}", name, SEPARATOR)
}

/// Builds a [`Tree`] from the filesystem
pub struct TreeBuilder {
    root: PathBuf,
    walker_config: Option<WalkerConfig>,
    workers: usize,
}

impl TreeBuilder {
    /// Create a new tree builder for the given root path
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            walker_config: None,
            workers: 4,
        }
    }

    /// Set walker config (extensions, ignore patterns). When set, the walker
    /// uses this config instead of the default.
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = Some(config);
        self
    }

    /// Number of threads reading files; at least one
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Build the tree from the filesystem
    ///
    /// Directories are added as the walk discovers them; tracked files are read
    /// by a bounded pool of worker threads. Unreadable files are skipped with a
    /// warning, while a walk error aborts the build.
    #[instrument(skip(self), fields(root = %self.root.display(), workers = self.workers))]
    pub fn build(&self) -> Result<Tree, StorageError> {
        let start = Instant::now();
        info!("Starting tree build");

        let walker = match &self.walker_config {
            Some(config) => Walker::with_config(self.root.clone(), config.clone()),
            None => Walker::new(self.root.clone()),
        };
        let entries = match walker.walk() {
            Ok(e) => {
                debug!(entry_count = e.len(), "Walked filesystem");
                e
            }
            Err(e) => {
                error!("Filesystem walk failed: {}", e);
                return Err(e);
            }
        };

        let mut tree = Tree::new(self.root.clone());
        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Entry::Directory { path } => {
                    let relative = relative_path_string(&path, &self.root)?;
                    tree.insert(&relative, None);
                }
                Entry::File { path, .. } => files.push(path),
            }
        }

        let tree = Mutex::new(tree);
        let skipped = AtomicUsize::new(0);
        if !files.is_empty() {
            let chunk_size = files.len().div_ceil(self.workers);
            std::thread::scope(|scope| {
                for chunk in files.chunks(chunk_size) {
                    let tree = &tree;
                    let skipped = &skipped;
                    scope.spawn(move || {
                        for path in chunk {
                            if !self.index_file(tree, path) {
                                skipped.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    });
                }
            });
        }

        let mut tree = tree.into_inner();
        tree.recompute_hashes();

        let duration = start.elapsed();
        info!(
            file_count = files.len(),
            skipped = skipped.load(Ordering::Relaxed),
            node_count = tree.node_count(),
            root_hash = %tree.root_hash(),
            duration_ms = duration.as_millis(),
            "Tree build completed"
        );

        Ok(tree)
    }

    fn index_file(&self, tree: &Mutex<Tree>, path: &Path) -> bool {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                return false;
            }
        };
        let relative = match relative_path_string(path, &self.root) {
            Ok(relative) => relative,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping file outside root");
                return false;
            }
        };
        trace!(path = %relative, bytes = content.len(), "Indexed file");
        tree.lock().insert(&relative, Some(&content));
        true
    }
}
