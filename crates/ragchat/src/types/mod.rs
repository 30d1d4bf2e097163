//! Core types for the RAG engine

pub mod chat;
pub mod document;

pub use chat::ConversationTurn;
pub use document::{Chunk, Document};
