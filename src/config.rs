use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters carried over between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Provider name: `google` or `ollama`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector dimensionality. Must match the index collection.
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Base URL override (defaults per provider).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the provider API key.
    #[serde(default = "default_embedding_key_env")]
    pub api_key_env: String,
    /// Texts per provider call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Concurrent in-flight batch calls during ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Retries for rate-limited (429) and 5xx responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_provider() -> String {
    "google".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_embedding_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_concurrency() -> usize {
    2
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Qdrant base URL, e.g. `http://localhost:6333`.
    pub url: String,
    /// Environment variable holding the Qdrant API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_collection() -> String {
    "testcase-generation".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Provider name: `google` or `ollama`.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
    /// Upper bound on the requested test-case count.
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Fail the call when the model returns a different count than requested.
    #[serde(default)]
    pub strict_count: bool,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_generation_provider() -> String {
    "google".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_generation_key_env() -> String {
    "TEST_CASE_API_KEY".to_string()
}
fn default_max_count() -> usize {
    20
}
fn default_generation_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Top-k retrieval results per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            top_k: default_top_k(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7610".to_string()
}
fn default_top_k() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.concurrency == 0 {
        anyhow::bail!("embedding.concurrency must be > 0");
    }
    match config.embedding.provider.as_str() {
        "google" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be google or ollama.",
            other
        ),
    }

    if config.index.url.trim().is_empty() {
        anyhow::bail!("index.url must be set");
    }
    if config.index.collection.trim().is_empty() {
        anyhow::bail!("index.collection must be set");
    }

    match config.generation.provider.as_str() {
        "google" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be google or ollama.",
            other
        ),
    }
    if config.generation.max_count == 0 || config.generation.max_count > 20 {
        anyhow::bail!("generation.max_count must be in 1..=20");
    }

    if config.server.top_k == 0 {
        anyhow::bail!("server.top_k must be > 0");
    }

    Ok(())
}

/// Read an API key from the environment variable named in config.
///
/// Returns `None` when the variable is unset or empty; providers decide
/// whether a key is mandatory.
pub fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
