//! Core data models used throughout casegen.
//!
//! These types represent the chunks, retrieval results, and generated test
//! cases that flow through the ingestion and generation pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata attached to every stored chunk.
///
/// The `document_id`/`document_name` pair is required and identical across
/// all chunks of one upload; provider-specific fields go into `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "documentId")]
    pub document_id: Uuid,
    #[serde(rename = "documentName")]
    pub document_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChunkMetadata {
    pub fn new(document_id: Uuid, document_name: impl Into<String>) -> Self {
        Self {
            document_id,
            document_name: document_name.into(),
            extra: Map::new(),
        }
    }
}

/// A chunk of document text together with its embedding, ready for upsert.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Identity of the currently ingested document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    #[serde(rename = "documentId")]
    pub document_id: Uuid,
    #[serde(rename = "documentName")]
    pub document_name: String,
}

/// One ranked context snippet returned from retrieval. Ephemeral, produced
/// per query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
    /// 1-based rank in the index's similarity order.
    #[serde(rename = "index")]
    pub rank: usize,
    pub text: String,
    pub metadata: Value,
    pub score: f32,
}

/// Test-case priority, the only values the generation model may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A single validated test case parsed from the generation model's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "testcaseID")]
    pub testcase_id: String,
    pub description: String,
    pub steps: Vec<String>,
    #[serde(rename = "expectedResults")]
    pub expected_results: String,
    pub priority: Priority,
}
