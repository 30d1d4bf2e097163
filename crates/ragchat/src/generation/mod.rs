//! Answer generation with bounded concurrency and fail-soft degradation

pub mod prompt;
pub mod service;

pub use prompt::PromptBuilder;
pub use service::{GenerationService, GENERATION_FALLBACK};
