//! Engine wiring: backend selection and session creation

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::GenerationService;
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaClient, OllamaEmbedder, OllamaLlm};
use crate::session::ChatSession;
use crate::types::Document;

/// Engine holding the configured backends and the process-wide generation
/// gate.
///
/// Backends are chosen once at construction; sessions created from the same
/// engine share one [`GenerationService`], so the `workers` bound applies
/// across all of them.
pub struct RagEngine {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    generation: Arc<GenerationService>,
}

impl RagEngine {
    /// Create an engine backed by an Ollama server.
    ///
    /// Fatal configuration errors (invalid sizes, zero workers) abort
    /// creation here rather than surfacing mid-conversation.
    pub fn new(config: RagConfig) -> Result<Self> {
        config.validate()?;

        let client = Arc::new(OllamaClient::new(&config.llm)?);
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::from_client(
            Arc::clone(&client),
            config.embeddings.dimensions,
        ));
        let llm: Arc<dyn LlmProvider> = Arc::new(OllamaLlm::from_client(
            client,
            config.llm.generate_model.clone(),
        ));

        Self::with_providers(config, embedder, llm)
    }

    /// Create an engine with explicit backend implementations.
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;

        tracing::info!(
            embedder = embedder.name(),
            dimensions = embedder.dimensions(),
            llm = llm.name(),
            model = llm.model(),
            workers = config.generation.workers,
            "RAG engine initialized"
        );

        let generation = Arc::new(GenerationService::new(llm, config.generation.workers));

        Ok(Self {
            config,
            embedder,
            generation,
        })
    }

    /// Start a new conversation session in plain-chat mode
    pub fn session(&self) -> ChatSession {
        ChatSession::new(
            self.config.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.generation),
        )
    }

    /// Start a session and ingest a document into it.
    pub async fn ingest(&self, document: Document) -> Result<ChatSession> {
        let mut session = self.session();
        session.ingest(document).await?;
        Ok(session)
    }

    /// Engine configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}
