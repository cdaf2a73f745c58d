//! Filesystem watcher
//!
//! Keeps the client tree in step with the notes directory. Every directory gets
//! its own non-recursive watch: new directories are added to the watch set as
//! they appear and dropped when they are removed. Events flow through one
//! channel into one loop, so the watcher is the only writer of the client tree.

use crate::error::SyncError;
use crate::tree::path::relative_path_string;
use crate::tree::walker::{Entry, Walker, WalkerConfig};
use crate::tree::SharedTree;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Filesystem change event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// Convert a notify event into change events
///
/// Renames are reported by notify as `Modify(Name(..))`; halves of a rename
/// become a removal or a creation.
pub fn convert_event(event: Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.into_iter().map(ChangeEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event.paths.into_iter().map(ChangeEvent::Removed).collect(),
            RenameMode::To => event.paths.into_iter().map(ChangeEvent::Created).collect(),
            RenameMode::Both if event.paths.len() >= 2 => {
                let mut paths = event.paths.into_iter();
                match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => vec![ChangeEvent::Renamed { from, to }],
                    _ => Vec::new(),
                }
            }
            _ => event
                .paths
                .into_iter()
                .map(|path| {
                    if path.exists() {
                        ChangeEvent::Created(path)
                    } else {
                        ChangeEvent::Removed(path)
                    }
                })
                .collect(),
        },
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.into_iter().map(ChangeEvent::Modified).collect(),
        EventKind::Remove(_) => event.paths.into_iter().map(ChangeEvent::Removed).collect(),
        _ => Vec::new(),
    }
}

/// Watches the notes directory and mutates the client tree
pub struct FileWatcher {
    root: PathBuf,
    tree: SharedTree,
    filter: WalkerConfig,
    watched: HashSet<PathBuf>,
}

impl FileWatcher {
    /// Create a watcher for `root`; the path is canonicalized
    pub fn new(root: &Path, tree: SharedTree, filter: WalkerConfig) -> Result<Self, SyncError> {
        let root = dunce::canonicalize(root)?;
        Ok(Self {
            root,
            tree,
            filter,
            watched: HashSet::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directories currently under watch
    pub fn watched(&self) -> &HashSet<PathBuf> {
        &self.watched
    }

    /// Watch until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), SyncError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            if tx.send(res).is_err() {
                trace!("Watch event dropped after shutdown");
            }
        })?;

        let root = self.root.clone();
        self.watch_directory(&mut watcher, &root)?;
        for entry in Walker::with_config(root, self.filter.clone()).walk()? {
            if let Entry::Directory { path } = entry {
                self.watch_directory(&mut watcher, &path)?;
            }
        }
        info!(root = %self.root.display(), directories = self.watched.len(), "Watching notes directory");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("File watcher stopping");
                    break;
                }
                message = rx.recv() => match message {
                    Some(Ok(event)) => {
                        for change in convert_event(event) {
                            self.apply(&mut watcher, change).await;
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Watch error"),
                    None => {
                        error!("Watcher channel disconnected");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Apply one change to the watch set and the client tree
    pub async fn apply<W: Watcher>(&mut self, watcher: &mut W, change: ChangeEvent) {
        trace!(change = ?change, "Applying change");
        match change {
            ChangeEvent::Created(path) => self.on_created(watcher, &path).await,
            ChangeEvent::Modified(path) => {
                if path.is_file() {
                    self.on_created(watcher, &path).await;
                }
            }
            ChangeEvent::Removed(path) => self.on_removed(watcher, &path),
            ChangeEvent::Renamed { from, to } => {
                self.on_removed(watcher, &from);
                self.on_created(watcher, &to).await;
            }
        }
    }

    async fn on_created<W: Watcher>(&mut self, watcher: &mut W, path: &Path) {
        let Some(relative) = self.relative(path) else {
            return;
        };

        if path.is_dir() {
            if let Err(e) = self.watch_directory(watcher, path) {
                warn!(path = %relative, error = %e, "Failed to watch new directory");
            }
            // Files may land before the watch is registered
            let entries = match Walker::with_config(path.to_path_buf(), self.filter.clone()).walk() {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %relative, error = %e, "Failed to scan new directory");
                    return;
                }
            };
            for entry in entries {
                match entry {
                    Entry::Directory { path } => {
                        if let Err(e) = self.watch_directory(watcher, &path) {
                            warn!(path = %path.display(), error = %e, "Failed to watch directory");
                        }
                    }
                    Entry::File { path, .. } => self.update_file(&path).await,
                }
            }
        } else if self.filter.is_tracked_extension(path) {
            self.update_file(path).await;
        }
    }

    fn on_removed<W: Watcher>(&mut self, watcher: &mut W, path: &Path) {
        let Some(relative) = self.relative(path) else {
            return;
        };

        let gone: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|watched| watched.starts_with(path))
            .cloned()
            .collect();
        for dir in gone {
            // The OS drops watches on deleted directories itself
            if let Err(e) = watcher.unwatch(&dir) {
                trace!(path = %dir.display(), error = %e, "Unwatch failed");
            }
            self.watched.remove(&dir);
        }

        if self.tree.lock().remove(&relative) {
            debug!(path = %relative, "Removed from client tree");
        }
    }

    async fn update_file(&self, path: &Path) {
        let Some(relative) = self.relative(path) else {
            return;
        };
        match tokio::fs::read(path).await {
            Ok(content) => {
                self.tree.lock().add_or_update(&relative, Some(&content));
                debug!(path = %relative, bytes = content.len(), "Updated client tree");
            }
            Err(e) => warn!(path = %relative, error = %e, "Failed to read changed file"),
        }
    }

    fn watch_directory<W: Watcher>(&mut self, watcher: &mut W, path: &Path) -> Result<(), SyncError> {
        if self.watched.contains(path) {
            return Ok(());
        }
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        self.watched.insert(path.to_path_buf());
        trace!(path = %path.display(), "Watching directory");
        Ok(())
    }

    /// Tree path for `path`, or None when it is outside the root or ignored
    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        if relative.as_os_str().is_empty() || self.filter.is_ignored(relative) {
            return None;
        }
        relative_path_string(path, &self.root).ok()
    }
}
