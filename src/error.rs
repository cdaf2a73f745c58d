//! Error types for the notes synchronization engine.

use thiserror::Error;

/// Tree, walk and snapshot errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Failed to walk directory: {0}")]
    Walk(String),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised by the embedding endpoint or the remote vector index
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Vector store request failed: {0}")]
    RequestFailed(String),

    #[error("Vector store authentication failed: {0}")]
    AuthFailed(String),

    #[error("Vector store rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Invalid response from vector store: {0}")]
    InvalidResponse(String),

    #[error("Embedding endpoint returned no vectors")]
    EmptyEmbedding,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

/// Top-level error for the synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// True for the clean-shutdown signal, which callers should not report as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        SyncError::Watch(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Storage(StorageError::IoError(err))
    }
}
