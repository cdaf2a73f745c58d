//! Filesystem walker for traversing the notes directory

use crate::error::StorageError;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Filesystem entry types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A tracked file entry with its path and size
    File { path: PathBuf, size: u64 },
    /// A directory entry with its path
    Directory { path: PathBuf },
}

impl Entry {
    pub fn path(&self) -> &Path {
        match self {
            Entry::File { path, .. } | Entry::Directory { path } => path,
        }
    }
}

/// Filesystem walker configuration
///
/// Also serves as the path filter for the file watcher, so the initial build
/// and live updates agree on which paths belong in the tree.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: false)
    pub follow_symlinks: bool,
    /// Path components to ignore (e.g., ".git", ".notesync")
    pub ignore_patterns: Vec<String>,
    /// File extensions that are tracked, without the leading dot
    pub extensions: Vec<String>,
    /// Maximum depth to traverse (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            ignore_patterns: vec![".git".to_string(), ".notesync".to_string()],
            extensions: vec!["md".to_string()],
            max_depth: None,
        }
    }
}

impl WalkerConfig {
    /// True when any component of `relative` matches an ignore pattern
    pub fn is_ignored(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                self.ignore_patterns.iter().any(|p| p.as_str() == name)
            }
            _ => false,
        })
    }

    /// True when `path` has one of the tracked extensions
    pub fn is_tracked_extension(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy();
                self.extensions
                    .iter()
                    .any(|tracked| tracked.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            }
            None => false,
        }
    }
}

/// Filesystem walker
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given root path
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            config: WalkerConfig::default(),
        }
    }

    /// Create a walker with custom configuration
    pub fn with_config(root: PathBuf, config: WalkerConfig) -> Self {
        Self { root, config }
    }

    /// Walk the filesystem and collect directories and tracked files
    ///
    /// Returns entries sorted by path. Ignored subtrees are not descended into.
    /// Any walk error aborts the walk.
    pub fn walk(&self) -> Result<Vec<Entry>, StorageError> {
        let mut entries = Vec::new();

        let root = self.root.clone();
        let config = self.config.clone();
        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(move |entry| {
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                !config.is_ignored(relative)
            });

        for entry in walker {
            let entry = entry.map_err(|e| StorageError::Walk(e.to_string()))?;

            let path = entry.path().to_path_buf();

            // Skip the root directory itself (we only want its contents)
            if path == self.root {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| {
                StorageError::Walk(format!("Failed to read metadata for {:?}: {}", path, e))
            })?;

            if metadata.is_dir() {
                entries.push(Entry::Directory { path });
            } else if metadata.is_file() && self.config.is_tracked_extension(&path) {
                entries.push(Entry::File {
                    path,
                    size: metadata.len(),
                });
            }
        }

        entries.sort_by(|a, b| a.path().cmp(b.path()));

        Ok(entries)
    }
}
