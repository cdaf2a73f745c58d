//! Reconciliation loop
//!
//! Each pass diffs the client tree against the server tree, pushes every change
//! to the vector store, and persists the server tree. The server tree only
//! advances for changes the store accepted, so failed work reappears in the
//! next pass.

use crate::error::{StorageError, SyncError};
use crate::tree::hasher::compute_vector_id;
use crate::tree::snapshot::write_atomic;
use crate::tree::{DiffKind, SharedTree, TreeDiff};
use crate::vector::VectorStore;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Where a pass currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Diffing,
    Dispatching,
    Persisting,
}

/// Outcome counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub diffs: usize,
    pub upserted: usize,
    pub removed: usize,
    /// Stale files dropped because a directory now occupies their path
    pub replaced: usize,
    pub failed: usize,
}

enum Outcome {
    Upserted,
    Removed,
    Replaced,
    Failed,
}

pub struct Synchronizer {
    client: SharedTree,
    server: SharedTree,
    store: Arc<dyn VectorStore>,
    notes_root: PathBuf,
    snapshot_path: PathBuf,
    interval: Duration,
    max_concurrent: usize,
    phase: Mutex<PassPhase>,
    abort: CancellationToken,
}

impl Synchronizer {
    /// Files are read relative to the client tree's base directory
    pub fn new(
        client: SharedTree,
        server: SharedTree,
        store: Arc<dyn VectorStore>,
        snapshot_path: PathBuf,
    ) -> Self {
        let notes_root = client.lock().base().to_path_buf();
        Self {
            client,
            server,
            store,
            notes_root,
            snapshot_path,
            interval: DEFAULT_SYNC_INTERVAL,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            phase: Mutex::new(PassPhase::Idle),
            abort: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Upper bound on handlers running at once; at least one
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn phase(&self) -> PassPhase {
        *self.phase.lock()
    }

    pub fn server_tree(&self) -> &SharedTree {
        &self.server
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Cancel an in-flight diff; the loop exits after the current pass
    pub fn abort(&self) {
        self.abort.cancel();
    }

    fn set_phase(&self, phase: PassPhase) {
        *self.phase.lock() = phase;
    }

    /// Run passes on a fixed period until `shutdown` fires
    ///
    /// A pass in progress when `shutdown` fires runs to completion, including
    /// its persist step.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SyncError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        info!(
            interval_ms = self.interval.as_millis(),
            max_concurrent = self.max_concurrent,
            "Synchronizer started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Synchronizer stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_pass().await {
                        Ok(_) => {}
                        Err(e) if e.is_cancelled() => {
                            info!("Reconciliation pass aborted");
                            break;
                        }
                        Err(e) => error!(error = %e, "Reconciliation pass failed"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Run one Diffing → Dispatching → Persisting pass
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Result<PassReport, SyncError> {
        let result = self.pass().await;
        self.set_phase(PassPhase::Idle);
        result
    }

    async fn pass(&self) -> Result<PassReport, SyncError> {
        let start = Instant::now();

        self.set_phase(PassPhase::Diffing);
        let (diffs, baseline) = {
            let client = self.client.lock();
            let server = self.server.lock();
            (client.diff(&server, &self.abort)?, server.clone())
        };
        debug!(diffs = diffs.len(), "Diff complete");

        self.set_phase(PassPhase::Dispatching);
        let mut report = PassReport {
            diffs: diffs.len(),
            ..PassReport::default()
        };
        let upserted = AtomicUsize::new(0);
        let removed = AtomicUsize::new(0);
        let replaced = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);
        stream::iter(diffs)
            .for_each_concurrent(self.max_concurrent, |diff| {
                let (upserted, removed, replaced, failed) = (&upserted, &removed, &replaced, &failed);
                async move {
                    let counter = match self.handle(&diff).await {
                        Outcome::Upserted => upserted,
                        Outcome::Removed => removed,
                        Outcome::Replaced => replaced,
                        Outcome::Failed => failed,
                    };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .await;
        report.upserted = upserted.into_inner();
        report.removed = removed.into_inner();
        report.replaced = replaced.into_inner();
        report.failed = failed.into_inner();

        self.set_phase(PassPhase::Persisting);
        if let Err(e) = self.persist().await {
            *self.server.lock() = baseline;
            error!(
                path = %self.snapshot_path.display(),
                error = %e,
                "Failed to persist snapshot, server tree rolled back"
            );
            return Err(e);
        }

        info!(
            diffs = report.diffs,
            upserted = report.upserted,
            removed = report.removed,
            replaced = report.replaced,
            failed = report.failed,
            duration_ms = start.elapsed().as_millis(),
            "Reconciliation pass completed"
        );
        Ok(report)
    }

    async fn handle(&self, diff: &TreeDiff) -> Outcome {
        match diff.kind {
            DiffKind::Removed => {
                // Remote entries are left in place
                self.server.lock().remove(&diff.path);
                debug!(path = %diff.path, "Removed from server tree");
                Outcome::Removed
            }
            DiffKind::Added | DiffKind::Modified if diff.is_directory() => {
                // A file replaced by a directory; its leaves arrive as additions next pass
                self.server.lock().remove(&diff.path);
                debug!(path = %diff.path, "Dropped replaced file from server tree");
                Outcome::Replaced
            }
            DiffKind::Added | DiffKind::Modified => match self.index_file(&diff.path).await {
                Ok(()) => Outcome::Upserted,
                Err(e) => {
                    warn!(path = %diff.path, kind = %diff.kind, error = %e, "Failed to index note");
                    Outcome::Failed
                }
            },
        }
    }

    async fn index_file(&self, relative: &str) -> Result<(), SyncError> {
        let path = self.notes_root.join(relative);
        let content = tokio::fs::read(&path).await?;
        let modified = modified_unix_secs(&path).await;

        let path_str = path.to_string_lossy();
        let id = compute_vector_id(&path_str);
        self.store.upsert(&id, &content, &path_str, modified).await?;

        self.server.lock().add_or_update(relative, Some(&content));
        Ok(())
    }

    async fn persist(&self) -> Result<(), SyncError> {
        let bytes = self.server.lock().to_snapshot_bytes()?;
        let path = self.snapshot_path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StorageError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        Ok(())
    }
}

async fn modified_unix_secs(path: &Path) -> i64 {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(time) => chrono::DateTime::<chrono::Utc>::from(time).timestamp(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Modification time unavailable, using now");
            chrono::Utc::now().timestamp()
        }
    }
}
