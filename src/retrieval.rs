//! Query-time similarity retrieval.
//!
//! Embeds the user's prompt, searches the index for the top-k matches, and
//! maps them to ranked context snippets in the index's similarity order —
//! no re-sorting happens here.

use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::index::{QdrantIndex, SearchHit};
use crate::models::RetrievedContext;

/// Retrieve up to `k` context snippets for a query prompt.
///
/// An empty result is a valid outcome meaning "no relevant content", not an
/// error.
pub async fn retrieve(
    embedder: &EmbeddingClient,
    index: &QdrantIndex,
    query: &str,
    k: usize,
) -> Result<Vec<RetrievedContext>> {
    if query.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "prompt must not be empty".to_string(),
        ));
    }

    let vector = embedder.embed(query).await?;
    let mut hits = index.search(&vector, k).await?;
    // The index contract already bounds the result; the truncate keeps the
    // guarantee local if a server ever over-returns.
    hits.truncate(k);
    tracing::debug!(query, hits = hits.len(), "retrieval complete");
    Ok(rank_hits(hits))
}

/// Assign 1-based ranks in the order the index returned.
fn rank_hits(hits: Vec<SearchHit>) -> Vec<RetrievedContext> {
    hits.into_iter()
        .enumerate()
        .map(|(i, hit)| RetrievedContext {
            rank: i + 1,
            text: hit.text,
            metadata: hit.metadata,
            score: hit.score,
        })
        .collect()
}
