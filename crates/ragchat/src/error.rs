//! Error types for the RAG engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG engine errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal, aborts engine creation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document ingestion error (bad or empty document, chunking failure)
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    /// Persisted index artifact is missing
    #[error("Vector index not found at {0}")]
    IndexNotFound(PathBuf),

    /// Persisted index artifact failed to deserialize
    #[error("Vector index is corrupt: {0}")]
    IndexCorrupt(String),

    /// Embedding dimension does not match the configured backend dimension.
    /// This is a configuration bug, not a recoverable runtime condition.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Similarity search failure
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Language-model backend failure
    #[error("Generation failed: {0}")]
    Generation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an ingestion error
    pub fn ingestion(message: impl Into<String>) -> Self {
        Self::Ingestion(message.into())
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }
}
