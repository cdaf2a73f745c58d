//! Vector store abstraction
//!
//! The synchronizer only needs [`VectorStore::upsert`]. Implementations embed the
//! note text through an [`Embedder`] and write the vector, keyed by a stable id,
//! to an index. Deletes are not part of the interface: removed notes stay in the
//! remote index.

use crate::error::VectorStoreError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod embedding;
pub mod memory;
pub mod pinecone;

pub use embedding::HttpEmbedder;
pub use memory::MemoryVectorStore;
pub use pinecone::PineconeIndex;

/// Metadata stored alongside each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub filepath: String,
    pub modified: i64,
}

/// A ranked query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<VectorMetadata>,
}

/// Turns text into an embedding vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorStoreError>;

    fn model_name(&self) -> &str;
}

/// Remote semantic index receiving embedded note content
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed `content` and write it under `id`, replacing any previous vector
    async fn upsert(
        &self,
        id: &str,
        content: &[u8],
        path: &str,
        last_modified: i64,
    ) -> Result<(), VectorStoreError>;

    /// Return the `top_k` nearest vectors to `vector`
    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<QueryMatch>, VectorStoreError>;

    /// Store name for logs
    fn name(&self) -> &str;
}

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn build_http_client() -> Result<Client, VectorStoreError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| VectorStoreError::Client(e.to_string()))
}

pub(crate) fn map_http_error(error: reqwest::Error) -> VectorStoreError {
    if let Some(status) = error.status() {
        status_error(status, &error.to_string())
    } else if error.is_timeout() {
        VectorStoreError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        VectorStoreError::RequestFailed(format!("Connection error: {}", error))
    } else {
        VectorStoreError::RequestFailed(format!("HTTP error: {}", error))
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> VectorStoreError {
    match status.as_u16() {
        401 | 403 => VectorStoreError::AuthFailed(format!("Authentication failed: {}", body)),
        429 => VectorStoreError::RateLimited(format!("Rate limit exceeded: {}", body)),
        _ => VectorStoreError::RequestFailed(format!("Request failed with status {}: {}", status, body)),
    }
}

/// Fail with the mapped status error unless the response is 2xx
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, VectorStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(status_error(status, &body))
}
