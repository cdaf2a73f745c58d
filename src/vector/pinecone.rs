//! Pinecone index over its REST data-plane API

use crate::error::VectorStoreError;
use crate::vector::{
    build_http_client, check_status, map_http_error, Embedder, QueryMatch, VectorMetadata,
    VectorStore,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: Vec<f32>,
    metadata: VectorMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryResponseMatch>,
}

#[derive(Deserialize)]
struct QueryResponseMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<VectorMetadata>,
}

/// Pinecone index addressed by its host URL
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
    embedder: Arc<dyn Embedder>,
}

impl PineconeIndex {
    pub fn new(
        host: &str,
        api_key: String,
        namespace: Option<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, VectorStoreError> {
        Ok(Self {
            client: build_http_client()?,
            host: normalize_host(host),
            api_key,
            namespace: namespace.filter(|ns| !ns.is_empty()),
            embedder,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Index hosts are often given without a scheme
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn upsert(
        &self,
        id: &str,
        content: &[u8],
        path: &str,
        last_modified: i64,
    ) -> Result<(), VectorStoreError> {
        info!(path = %path, "Vectorizing note");
        let text = String::from_utf8_lossy(content);
        let values = self.embedder.embed(&text).await?;

        let request = UpsertRequest {
            vectors: vec![UpsertVector {
                id,
                values,
                metadata: VectorMetadata {
                    filepath: path.to_string(),
                    modified: last_modified,
                },
            }],
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.host))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;
        check_status(response).await?;

        info!(path = %path, id = %id, "Upserted vector");
        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<QueryMatch>, VectorStoreError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;
        let response = check_status(response).await?;

        let body: QueryResponse = response.json().await.map_err(|e| {
            VectorStoreError::InvalidResponse(format!("Failed to parse query response: {}", e))
        })?;
        debug!(matches = body.matches.len(), "Query completed");

        Ok(body
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
