//! Qdrant vector-index client.
//!
//! A thin adapter over Qdrant's REST API scoped to what the pipeline needs:
//! create the collection, replace its contents, and run k-nearest-neighbor
//! search. The collection holds at most one document's chunks at a time, so
//! there is no per-point bookkeeping — point IDs are fresh v4 UUIDs
//! assigned here on upsert.

use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{api_key_from_env, IndexConfig};
use crate::error::{Error, Result};
use crate::models::{DocumentChunk, DocumentRef};

/// One scored match returned from similarity search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub text: String,
    pub metadata: Value,
    pub score: f32,
}

/// Client for one Qdrant collection.
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    dims: usize,
    timeout_secs: u64,
}

impl QdrantIndex {
    /// `dims` must match the embedding model; the collection is created
    /// with it and every outgoing vector is checked against it.
    pub fn new(config: &IndexConfig, dims: usize) -> Result<Self> {
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(api_key_from_env);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::IndexUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key,
            collection: config.collection.clone(),
            dims,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection with cosine distance if it does not exist.
    pub async fn ensure_collection(&self) -> Result<()> {
        let path = format!("/collections/{}", self.collection);
        if self.send(reqwest::Method::GET, &path, None).await.is_ok() {
            return Ok(());
        }

        let body = json!({
            "vectors": { "size": self.dims, "distance": "Cosine" }
        });
        self.send(reqwest::Method::PUT, &path, Some(body)).await?;
        tracing::info!(collection = %self.collection, dims = self.dims, "created collection");
        Ok(())
    }

    /// Delete every point in the collection.
    pub async fn clear_all(&self) -> Result<()> {
        let path = format!("/collections/{}/points/delete?wait=true", self.collection);
        let body = json!({ "filter": {} });
        self.send(reqwest::Method::POST, &path, Some(body)).await?;
        Ok(())
    }

    /// Upsert chunks as new points. IDs are assigned here; callers never
    /// reference individual points again.
    pub async fn upsert(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        for chunk in chunks {
            if chunk.embedding.len() != self.dims {
                return Err(Error::DimensionMismatch {
                    expected: self.dims,
                    actual: chunk.embedding.len(),
                });
            }
        }

        let points: Vec<Value> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "id": Uuid::new_v4(),
                    "vector": chunk.embedding,
                    "payload": {
                        "text": chunk.text,
                        "metadata": chunk.metadata,
                    },
                })
            })
            .collect();

        let path = format!("/collections/{}/points?wait=true", self.collection);
        self.send(reqwest::Method::PUT, &path, Some(json!({ "points": points })))
            .await?;
        Ok(())
    }

    /// Top-k similarity search, ranked by descending score by the server.
    pub async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if vector.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        let path = format!("/collections/{}/points/search", self.collection);
        let body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        let response = self.send(reqwest::Method::POST, &path, Some(body)).await?;
        parse_search_response(&response)
    }

    /// Identity of the currently stored document, if any.
    ///
    /// Reads a single arbitrary point's payload — every point of an upload
    /// carries the same document pair, so one is enough.
    pub async fn current_document(&self) -> Result<Option<DocumentRef>> {
        let path = format!("/collections/{}/points/scroll", self.collection);
        let body = json!({ "limit": 1, "with_payload": true });
        let response = self.send(reqwest::Method::POST, &path, Some(body)).await?;
        Ok(parse_scroll_response(&response))
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }
        if let Some(ref body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout("vector index", self.timeout_secs)
            } else {
                Error::IndexUnavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::IndexUnavailable(format!(
                "HTTP {}: {}",
                status, body_text
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::IndexUnavailable(e.to_string()))
    }
}

/// Extract `(text, metadata, score)` triples from a search response,
/// preserving the server's ranking order.
fn parse_search_response(json: &Value) -> Result<Vec<SearchHit>> {
    let points = json
        .get("result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| Error::IndexUnavailable("search response missing result".to_string()))?;

    let hits = points
        .iter()
        .map(|point| {
            let payload = point.get("payload").cloned().unwrap_or(Value::Null);
            SearchHit {
                text: payload
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
                metadata: payload.get("metadata").cloned().unwrap_or(Value::Null),
                score: point
                    .get("score")
                    .and_then(|s| s.as_f64())
                    .unwrap_or(0.0) as f32,
            }
        })
        .collect();

    Ok(hits)
}

fn parse_scroll_response(json: &Value) -> Option<DocumentRef> {
    let point = json
        .get("result")
        .and_then(|r| r.get("points"))
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())?;

    let metadata = point.get("payload")?.get("metadata")?;
    serde_json::from_value(metadata.clone()).ok()
}
