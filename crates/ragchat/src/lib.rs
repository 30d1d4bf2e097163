//! ragchat: conversational RAG engine with document ingestion and grounded answers
//!
//! This crate turns a raw document into a persisted, queryable vector index and
//! turns user questions into context-grounded answers. Retrieval and generation
//! are offloaded from the calling task, and generation is bounded by a global
//! admission gate so a burst of sessions cannot overwhelm the model backend.

pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod types;

pub use config::RagConfig;
pub use engine::RagEngine;
pub use error::{Error, Result};
pub use session::ChatSession;
pub use types::{
    chat::ConversationTurn,
    document::{Chunk, Document},
};
