//! In-process vector store
//!
//! Backs `--dry-run` and the test suites. Without an embedder the content is
//! recorded with an empty vector. Paths registered with [`MemoryVectorStore::fail_on`]
//! make `upsert` fail, which exercises the retry path.

use crate::error::VectorStoreError;
use crate::vector::{Embedder, QueryMatch, VectorMetadata, VectorStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// A stored vector with the text it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVector {
    pub values: Vec<f32>,
    pub content: String,
    pub metadata: VectorMetadata,
}

#[derive(Default)]
pub struct MemoryVectorStore {
    records: Mutex<HashMap<String, StoredVector>>,
    failing: Mutex<HashSet<String>>,
    upserts: AtomicUsize,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder: Some(embedder),
            ..Self::default()
        }
    }

    /// Make every upsert for `path` fail until [`clear_failures`](Self::clear_failures)
    pub fn fail_on(&self, path: impl Into<String>) {
        self.failing.lock().insert(path.into());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn get(&self, id: &str) -> Option<StoredVector> {
        self.records.lock().get(id).cloned()
    }

    /// Stored file paths, sorted
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .records
            .lock()
            .values()
            .map(|r| r.metadata.filepath.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of successful upserts, including overwrites
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(
        &self,
        id: &str,
        content: &[u8],
        path: &str,
        last_modified: i64,
    ) -> Result<(), VectorStoreError> {
        if self.failing.lock().contains(path) {
            return Err(VectorStoreError::RequestFailed(format!(
                "Injected failure for {}",
                path
            )));
        }

        let content = String::from_utf8_lossy(content).into_owned();
        let values = match &self.embedder {
            Some(embedder) => embedder.embed(&content).await?,
            None => Vec::new(),
        };

        self.records.lock().insert(
            id.to_string(),
            StoredVector {
                values,
                content,
                metadata: VectorMetadata {
                    filepath: path.to_string(),
                    modified: last_modified,
                },
            },
        );
        self.upserts.fetch_add(1, Ordering::SeqCst);
        info!(path = %path, id = %id, "Stored vector in memory");
        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let mut matches: Vec<QueryMatch> = self
            .records
            .lock()
            .iter()
            .map(|(id, record)| QueryMatch {
                id: id.clone(),
                score: cosine_similarity(&vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
