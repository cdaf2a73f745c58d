//! HTTP embedding client

use crate::error::VectorStoreError;
use crate::vector::{build_http_client, check_status, map_http_error, Embedder};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8000/embed";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding endpoint speaking `{model, input}` → `{embeddings}`
pub struct HttpEmbedder {
    client: Client,
    url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(url: String, model: String) -> Result<Self, VectorStoreError> {
        Ok(Self {
            client: build_http_client()?,
            url,
            model,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorStoreError> {
        let request = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;

        let body: EmbedResponse = response.json().await.map_err(|e| {
            VectorStoreError::InvalidResponse(format!("Failed to parse embedding response: {}", e))
        })?;

        let vector = body
            .embeddings
            .into_iter()
            .next()
            .ok_or(VectorStoreError::EmptyEmbedding)?;
        debug!(model = %self.model, dimensions = vector.len(), "Embedded text");
        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
