//! LLM provider trait for chat completion

use async_trait::async_trait;

use crate::error::Result;

/// Trait for language-model chat completion.
///
/// A single call per invocation; retry policy, if any, belongs to the
/// implementation, not the callers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a system prompt and a user prompt, return the raw model output
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier in use
    fn model(&self) -> &str;
}
