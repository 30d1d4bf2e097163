//! Vector index lifecycle and similarity retrieval

pub mod retriever;
pub mod store;

pub use retriever::Retriever;
pub use store::{ScoredChunk, VectorIndex};
