//! Persisted vector index with cosine similarity search

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::Chunk;

/// Similarity-search structure, persisted alongside the chunk metadata
const VECTORS_FILE: &str = "vectors.bin";
/// Chunk metadata mapping, persisted alongside the vectors
const CHUNKS_FILE: &str = "chunks.json";

/// One `build` in flight per storage path; concurrent re-ingestion of the
/// same path would otherwise race on the persisted artifact.
static PATH_LOCKS: Lazy<DashMap<PathBuf, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    PATH_LOCKS
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (higher is better)
    pub similarity: f32,
}

/// Serialized form of the similarity-search structure
#[derive(Serialize, Deserialize)]
struct VectorData {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

/// In-memory vector index over unit-normalized embeddings.
///
/// Read-only after build; any number of concurrent readers may search it
/// without locking.
pub struct VectorIndex {
    dimensions: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed every chunk, build the index, and persist it under `storage_path`.
    ///
    /// Persistence stages both files under temporary names and renames them
    /// into place, so a failed build leaves any previous artifact untouched.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        storage_path: &Path,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::ingestion("cannot index an empty chunk sequence"));
        }

        let expected = embedder.dimensions();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        let mut vectors = Vec::with_capacity(embeddings.len());
        for embedding in embeddings {
            if embedding.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
            vectors.push(normalize(embedding));
        }

        let index = Self {
            dimensions: expected,
            chunks,
            vectors,
        };

        let path = storage_path.to_path_buf();
        let index = tokio::task::spawn_blocking(move || -> Result<Self> {
            index.persist(&path)?;
            Ok(index)
        })
        .await
        .map_err(|e| Error::Internal(format!("task join error: {}", e)))??;

        tracing::info!(
            chunks = index.chunks.len(),
            dimensions = index.dimensions,
            path = %storage_path.display(),
            "vector index built and persisted"
        );
        Ok(index)
    }

    /// Load a previously persisted index from `storage_path`.
    pub async fn load(storage_path: &Path) -> Result<Self> {
        let path = storage_path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .map_err(|e| Error::Internal(format!("task join error: {}", e)))?
    }

    /// Load an existing index, or build a fresh one from `chunks` if loading
    /// fails for any reason (missing, corrupt, or stale artifact).
    ///
    /// Holds the per-path ingestion lock across the whole operation.
    pub async fn load_or_build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        storage_path: &Path,
    ) -> Result<Self> {
        let lock = path_lock(storage_path);
        let _guard = lock.lock().await;

        match Self::load(storage_path).await {
            Ok(index) if index.dimensions == embedder.dimensions() => {
                tracing::info!(
                    chunks = index.chunks.len(),
                    path = %storage_path.display(),
                    "loaded existing vector index"
                );
                return Ok(index);
            }
            Ok(index) => {
                tracing::warn!(
                    stored = index.dimensions,
                    configured = embedder.dimensions(),
                    "persisted index dimensions differ from configuration, rebuilding"
                );
            }
            Err(Error::IndexNotFound(_)) => {
                tracing::info!(path = %storage_path.display(), "no persisted vector index, building");
            }
            Err(e) => {
                tracing::warn!("failed to load vector index, rebuilding: {}", e);
            }
        }

        Self::build(chunks, embedder, storage_path).await
    }

    fn load_sync(dir: &Path) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        if !vectors_path.exists() || !chunks_path.exists() {
            return Err(Error::IndexNotFound(dir.to_path_buf()));
        }

        let bytes = std::fs::read(&vectors_path)?;
        let (data, _): (VectorData, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| Error::IndexCorrupt(format!("vector data: {}", e)))?;

        let chunk_bytes = std::fs::read(&chunks_path)?;
        let chunks: Vec<Chunk> = serde_json::from_slice(&chunk_bytes)
            .map_err(|e| Error::IndexCorrupt(format!("chunk metadata: {}", e)))?;

        if data.vectors.len() != chunks.len() {
            return Err(Error::IndexCorrupt(format!(
                "vector count {} does not match chunk count {}",
                data.vectors.len(),
                chunks.len()
            )));
        }

        Ok(Self {
            dimensions: data.dimensions,
            chunks,
            vectors: data.vectors,
        })
    }

    fn persist(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let data = VectorData {
            dimensions: self.dimensions,
            vectors: self.vectors.clone(),
        };
        let encoded = bincode::serde::encode_to_vec(&data, bincode::config::standard())
            .map_err(|e| Error::Internal(format!("failed to encode vector data: {}", e)))?;
        let chunk_bytes = serde_json::to_vec(&self.chunks)?;

        let vectors_tmp = dir.join(format!("{}.tmp", VECTORS_FILE));
        let chunks_tmp = dir.join(format!("{}.tmp", CHUNKS_FILE));
        std::fs::write(&vectors_tmp, &encoded)?;
        std::fs::write(&chunks_tmp, &chunk_bytes)?;

        std::fs::rename(&vectors_tmp, dir.join(VECTORS_FILE))?;
        std::fs::rename(&chunks_tmp, dir.join(CHUNKS_FILE))?;

        Ok(())
    }

    /// Nearest-neighbor search over the indexed chunks.
    ///
    /// Returns at most `k` results ordered by descending similarity.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let query = normalize(query.to_vec());
        let mut results: Vec<ScoredChunk> = self
            .vectors
            .iter()
            .zip(self.chunks.iter())
            .map(|(vector, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                similarity: dot(&query, vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }

    /// Embedding dimension of the indexed vectors
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
