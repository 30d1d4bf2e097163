//! Conversation session orchestration
//!
//! A session composes chunking, index lifecycle, retrieval, and generation
//! per conversational turn, and owns the append-only history.

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::{GenerationService, PromptBuilder};
use crate::ingestion::TextChunker;
use crate::providers::EmbeddingProvider;
use crate::retrieval::{Retriever, VectorIndex};
use crate::types::{ConversationTurn, Document};

/// Fixed, user-safe answer returned when retrieval fails during a normal turn
pub const RETRIEVAL_FALLBACK: &str =
    "Sorry, something went wrong while searching the document. Please try again later.";

/// A single conversation session.
///
/// Starts in plain-chat mode; a successful [`ingest`](Self::ingest) switches
/// it to RAG mode for the rest of its lifetime. Only the session mutates its
/// history: one turn appended per [`turn`](Self::turn), the last turn
/// replaced by [`regenerate`](Self::regenerate).
pub struct ChatSession {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generation: Arc<GenerationService>,
    retriever: Option<Retriever>,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    pub(crate) fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generation: Arc<GenerationService>,
    ) -> Self {
        Self {
            config,
            embedder,
            generation,
            retriever: None,
            history: Vec::new(),
        }
    }

    /// The conversation history so far
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Whether a document has been ingested into this session
    pub fn is_document_ready(&self) -> bool {
        self.retriever.is_some()
    }

    /// Ingest a document: chunk it, build or load the vector index, and wire
    /// up retrieval.
    ///
    /// On failure the session stays in plain-chat mode and the error is
    /// returned to the caller. Ingesting again replaces the previous
    /// document's retriever.
    pub async fn ingest(&mut self, document: Document) -> Result<()> {
        let chunker = TextChunker::new(
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        let chunks = chunker.split(&document)?;
        tracing::info!(
            document = %document.name,
            chunks = chunks.len(),
            "ingesting document"
        );

        let index = VectorIndex::load_or_build(
            chunks,
            self.embedder.as_ref(),
            &self.config.vector_db.storage_path,
        )
        .await?;

        self.retriever = Some(Retriever::new(
            Arc::new(index),
            Arc::clone(&self.embedder),
            self.config.retrieval.top_k,
        ));
        Ok(())
    }

    /// Process one user message and append the resulting turn.
    ///
    /// Whitespace-only messages are a no-op. Retrieval failures degrade to a
    /// fixed apology answer; the conversation never aborts on a single
    /// turn's failure.
    pub async fn turn(&mut self, message: &str) -> &[ConversationTurn] {
        if message.trim().is_empty() {
            return &self.history;
        }

        let answer = match self.grounded_answer(message).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "document retrieval failed");
                RETRIEVAL_FALLBACK.to_string()
            }
        };

        self.history.push(ConversationTurn::new(message, answer));
        &self.history
    }

    /// Recompute the answer for the most recent user message.
    ///
    /// No-op on empty history. Unlike [`turn`](Self::turn), a retrieval
    /// failure here is surfaced as the new assistant message instead of a
    /// generic apology, so the user can see why the regenerate produced
    /// nothing better.
    pub async fn regenerate(&mut self) -> &[ConversationTurn] {
        let Some(last) = self.history.pop() else {
            return &self.history;
        };
        let message = last.user_message;

        let answer = match self.grounded_answer(&message).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "retrieval failed during regenerate");
                e.to_string()
            }
        };

        self.history.push(ConversationTurn::new(message, answer));
        &self.history
    }

    /// Mode dispatch shared by `turn` and `regenerate`: plain chat without a
    /// document, retrieval-grounded otherwise.
    async fn grounded_answer(&self, message: &str) -> Result<String> {
        match &self.retriever {
            None => Ok(self.generation.answer(message, "", &self.history).await),
            Some(retriever) => {
                let results = retriever.retrieve(message).await?;
                let context = PromptBuilder::build_context(&results);
                Ok(self
                    .generation
                    .answer(message, &context, &self.history)
                    .await)
            }
        }
    }
}
