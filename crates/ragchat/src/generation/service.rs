//! Bounded-concurrency generation with fail-soft degradation

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::types::ConversationTurn;

use super::prompt::PromptBuilder;

/// Fixed, user-safe answer returned when the model backend fails
pub const GENERATION_FALLBACK: &str =
    "Sorry, something went wrong while generating an answer. Please try again later.";

/// Internal-reasoning segments emitted by reasoning models, stripped before
/// the answer reaches the user
static THINK_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think-tag pattern is valid"));

/// Generation service with a global admission gate.
///
/// At most `workers` language-model calls are in flight at any instant; the
/// service is shared across all sessions of an engine, so the bound is
/// process-wide. Waiters are admitted in no guaranteed order.
pub struct GenerationService {
    llm: Arc<dyn LlmProvider>,
    gate: Semaphore,
}

impl GenerationService {
    /// Create a new generation service bounded to `workers` concurrent calls
    pub fn new(llm: Arc<dyn LlmProvider>, workers: usize) -> Self {
        Self {
            llm,
            gate: Semaphore::new(workers),
        }
    }

    /// Generate an answer for a question given retrieved context and history.
    ///
    /// Never fails from the caller's perspective: backend errors are logged
    /// with full detail and degrade to [`GENERATION_FALLBACK`].
    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> String {
        match self.try_answer(question, context, history).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    model = self.llm.model(),
                    "answer generation failed"
                );
                GENERATION_FALLBACK.to_string()
            }
        }
    }

    async fn try_answer(
        &self,
        question: &str,
        context: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        tracing::info!(turns = history.len(), "user question: {}", question);

        let system = PromptBuilder::system_prompt();
        let user = PromptBuilder::user_prompt(question, context);

        // One backend call per invocation; the permit is held for exactly its
        // duration and released on failure too.
        let raw = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| Error::generation("admission gate closed"))?;
            self.llm.chat(system, &user).await?
        };

        let answer = strip_reasoning(&raw);
        tracing::info!("model answer: {}", answer);
        Ok(answer)
    }
}

/// Remove `<think>...</think>` segments and trim surrounding whitespace
fn strip_reasoning(raw: &str) -> String {
    THINK_TAGS.replace_all(raw, "").trim().to_string()
}
