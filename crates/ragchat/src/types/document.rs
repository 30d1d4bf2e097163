//! Document and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document submitted for ingestion.
///
/// Immutable after construction; the engine never mutates a document once
/// it has been handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Source name (path or upload filename)
    pub name: String,
    /// Raw text content
    pub text: String,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document from a source name and raw text
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            text: text.into(),
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// A bounded, possibly overlapping slice of a document's text.
///
/// Chunks from the same document are ordered by `chunk_index`; consecutive
/// chunks may share up to the configured overlap. `char_start`/`char_end`
/// are byte offsets into the original text, so the non-overlapping portions
/// of the chunk sequence tile the document exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Parent document ID
    pub document_id: Uuid,
    /// Source document name, carried for context assembly and logging
    pub source: String,
    /// Text content
    pub text: String,
    /// Chunk index within the document, strictly increasing from 0
    pub chunk_index: u32,
    /// Byte offset of the chunk start in the original text
    pub char_start: usize,
    /// Byte offset one past the chunk end in the original text
    pub char_end: usize,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(
        document: &Document,
        text: String,
        chunk_index: u32,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            document_id: document.id,
            source: document.name.clone(),
            text,
            chunk_index,
            char_start,
            char_end,
        }
    }
}
