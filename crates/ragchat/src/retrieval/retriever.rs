//! Concurrency-placement adapter around vector index search

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;

use super::store::{ScoredChunk, VectorIndex};

/// Retriever over a built vector index.
///
/// Embeds the question with the same backend used at build time and runs the
/// similarity scan on the blocking pool, so the calling task's scheduler is
/// never stalled. Holds only shared references; concurrent `retrieve` calls
/// against the same index run in parallel.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    /// Create a retriever over an already-built index
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    /// Retrieve the most relevant chunks for a question, best match first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        let query = self.embedder.embed(question).await?;

        let index = Arc::clone(&self.index);
        let k = self.top_k;
        let results = tokio::task::spawn_blocking(move || index.search(&query, k))
            .await
            .map_err(|e| Error::Internal(format!("task join error: {}", e)))??;

        tracing::debug!(results = results.len(), "retrieval complete");
        Ok(results)
    }

    /// Number of chunks in the underlying index
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}
