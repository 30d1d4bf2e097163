//! Provider abstractions for the embedding and language-model backends
//!
//! Backends are selected at construction time behind trait objects; the
//! engine never inspects which implementation it is talking to.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
