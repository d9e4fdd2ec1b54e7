//! Ingestion pipeline orchestration.
//!
//! Coordinates the full upload flow: text extraction → chunking → batched
//! embedding → collection replacement. The index holds exactly one
//! document's chunks at a time, so the old contents are purged before the
//! new chunks land; retrieval can never mix chunks from two uploads.

use futures_util::{stream, StreamExt, TryStreamExt};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::extract::extract_text;
use crate::index::QdrantIndex;
use crate::models::{ChunkMetadata, DocumentChunk, DocumentRef};

/// Ingest an uploaded document, replacing the collection's contents.
///
/// Every stored chunk is tagged with the same freshly generated document ID
/// and the uploaded file's name. If the upsert fails after the clear
/// succeeded, the index is left empty — the error is surfaced and the
/// caller re-uploads; nothing is retried here.
pub async fn ingest(
    embedder: &EmbeddingClient,
    index: &QdrantIndex,
    chunking: &ChunkingConfig,
    bytes: &[u8],
    document_name: &str,
) -> Result<DocumentRef> {
    if bytes.is_empty() {
        return Err(Error::InvalidArgument("no file uploaded".to_string()));
    }
    if document_name.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "document name must not be empty".to_string(),
        ));
    }

    let text = extract_text(document_name, bytes)?;
    let chunks = chunk_text(&text, chunking);
    if chunks.is_empty() {
        return Err(Error::InvalidArgument(
            "document contains no extractable text".to_string(),
        ));
    }

    let document_id = Uuid::new_v4();
    tracing::info!(
        %document_id,
        document_name,
        chunks = chunks.len(),
        "ingesting document"
    );

    let embeddings = embed_all(embedder, &chunks).await?;

    let ingested_at = chrono::Utc::now().to_rfc3339();
    let records: Vec<DocumentChunk> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(text, embedding)| {
            let mut metadata = ChunkMetadata::new(document_id, document_name);
            metadata
                .extra
                .insert("ingested_at".to_string(), ingested_at.clone().into());
            DocumentChunk {
                text,
                embedding,
                metadata,
            }
        })
        .collect();

    index.clear_all().await?;
    if let Err(e) = index.upsert(&records).await {
        tracing::warn!(%document_id, "upsert failed after clear; collection is now empty");
        return Err(e);
    }

    tracing::info!(%document_id, points = records.len(), "document indexed");
    Ok(DocumentRef {
        document_id,
        document_name: document_name.to_string(),
    })
}

/// Embed all chunks in provider-sized batches, a bounded number in flight
/// at once. `buffered` keeps batch order, so vectors line up with chunks.
async fn embed_all(embedder: &EmbeddingClient, chunks: &[String]) -> Result<Vec<Vec<f32>>> {
    let batches: Vec<Vec<String>> = chunks
        .chunks(embedder.batch_size())
        .map(|batch| batch.to_vec())
        .collect();

    let per_batch: Vec<Vec<Vec<f32>>> = stream::iter(
        batches
            .into_iter()
            .map(|batch| async move { embedder.embed_batch(&batch).await }),
    )
    .buffered(embedder.concurrency())
    .try_collect()
    .await?;

    Ok(per_batch.into_iter().flatten().collect())
}
