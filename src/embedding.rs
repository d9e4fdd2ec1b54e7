//! Embedding provider client.
//!
//! Converts text into fixed-dimensionality vectors by calling a remote
//! embedding service — Google's `text-embedding-004` family or a local
//! Ollama instance's `/api/embed` endpoint. Batch calls preserve input
//! order, and every returned vector is checked against the configured
//! dimensionality before it leaves this module.
//!
//! # Retry Strategy
//!
//! Rate-limited (HTTP 429) and server-error (5xx) responses back off
//! exponentially — 1s, 2s, 4s, ... capped at 2^5 — up to
//! `embedding.max_retries`. Timeouts and other client errors fail
//! immediately so interactive latency stays predictable.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{api_key_from_env, EmbeddingConfig};
use crate::error::{Error, Result};

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Client for the configured embedding provider.
///
/// Construct once and inject wherever embeddings are needed; it holds the
/// HTTP connection pool and the resolved API key.
pub struct EmbeddingClient {
    http: reqwest::Client,
    config: EmbeddingConfig,
    api_key: Option<String>,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env);
        if config.provider == "google" && api_key.is_none() {
            return Err(Error::provider(
                "google",
                format!("{} environment variable not set", config.api_key_env),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::provider(&config.provider, e))?;

        Ok(Self {
            http,
            config: config.clone(),
            api_key,
        })
    }

    /// Vector dimensionality this client produces.
    pub fn dims(&self) -> usize {
        self.config.dims
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Texts per provider call.
    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Concurrent in-flight batch calls allowed during ingestion.
    pub fn concurrency(&self) -> usize {
        self.config.concurrency
    }

    /// Embed a single text (e.g. a search query).
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::provider(&self.config.provider, "empty embedding response"))
    }

    /// Embed a batch of texts, returning one vector per input in input order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = match self.config.provider.as_str() {
            "google" => self.embed_google(texts).await?,
            "ollama" => self.embed_ollama(texts).await?,
            other => {
                return Err(Error::provider(
                    other,
                    "unknown embedding provider".to_string(),
                ))
            }
        };

        if vectors.len() != texts.len() {
            return Err(Error::provider(
                &self.config.provider,
                format!(
                    "returned {} embeddings for {} inputs",
                    vectors.len(),
                    texts.len()
                ),
            ));
        }
        for vector in &vectors {
            if vector.len() != self.config.dims {
                return Err(Error::DimensionMismatch {
                    expected: self.config.dims,
                    actual: vector.len(),
                });
            }
        }

        Ok(vectors)
    }

    async fn embed_google(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let base = self.config.url.as_deref().unwrap_or(GOOGLE_BASE_URL);
        let key = self.api_key.as_deref().unwrap_or_default();
        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            base, self.config.model, key
        );

        let requests: Vec<Value> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": format!("models/{}", self.config.model),
                    "content": { "parts": [{ "text": t }] },
                })
            })
            .collect();
        let body = json!({ "requests": requests });

        let response = self.post_with_backoff("google", &url, &body).await?;
        parse_google_response(&response)
    }

    async fn embed_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let base = self.config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        let url = format!("{}/api/embed", base);
        let body = json!({
            "model": self.config.model,
            "input": texts,
        });

        let response = self.post_with_backoff("ollama", &url, &body).await?;
        parse_ollama_response(&response)
    }

    /// POST a JSON body, backing off on 429/5xx up to `max_retries`.
    async fn post_with_backoff(&self, provider: &str, url: &str, body: &Value) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.http.post(url).json(body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| Error::provider(provider, e));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            provider,
                            %status,
                            attempt,
                            "embedding request throttled or failed, backing off"
                        );
                        last_err = Some(Error::provider(
                            provider,
                            format!("HTTP {}: {}", status, body_text),
                        ));
                        continue;
                    }

                    // Client error (not 429): no point retrying.
                    return Err(Error::provider(
                        provider,
                        format!("HTTP {}: {}", status, body_text),
                    ));
                }
                Err(e) if e.is_timeout() => {
                    return Err(Error::timeout("embedding", self.config.timeout_secs));
                }
                Err(e) => return Err(Error::provider(provider, e)),
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::provider(provider, "embedding failed after retries")))
    }
}

/// Parse the Google `batchEmbedContents` response, extracting
/// `embeddings[].values` in order.
fn parse_google_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::provider("google", "response missing embeddings array"))?;

    let mut vectors = Vec::with_capacity(embeddings.len());
    for item in embeddings {
        let values = item
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| Error::provider("google", "embedding missing values array"))?;
        vectors.push(values_to_f32(values));
    }
    Ok(vectors)
}

/// Parse the Ollama `/api/embed` response (`embeddings` as raw arrays).
fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::provider("ollama", "response missing embeddings array"))?;

    let mut vectors = Vec::with_capacity(embeddings.len());
    for item in embeddings {
        let values = item
            .as_array()
            .ok_or_else(|| Error::provider("ollama", "embedding is not an array"))?;
        vectors.push(values_to_f32(values));
    }
    Ok(vectors)
}

fn values_to_f32(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}
