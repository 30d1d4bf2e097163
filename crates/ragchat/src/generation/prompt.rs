//! Prompt templates for grounded answer generation

use crate::retrieval::ScoredChunk;

/// Fixed system instruction sent with every generation call
const SYSTEM_PROMPT: &str = "\
You are a professional AI assistant. Answer the question based on the provided context.
- Keep the answer concise and avoid repetition
- If the context does not contain the relevant information, say so directly
- Keep the answer coherent and logical
- Reply in English";

/// Prompt builder for RAG generation
pub struct PromptBuilder;

impl PromptBuilder {
    /// The fixed system instruction
    pub fn system_prompt() -> &'static str {
        SYSTEM_PROMPT
    }

    /// Build the user turn embedding the question and retrieved context.
    ///
    /// `context` is empty in plain-chat mode; the template is kept identical
    /// in both modes.
    pub fn user_prompt(question: &str, context: &str) -> String {
        format!(
            "Answer the question using the following information:\n\
             Question: {}\n\
             Context: {}",
            question, context
        )
    }

    /// Join retrieved chunk texts into a context string, best match first,
    /// separated by blank lines.
    pub fn build_context(results: &[ScoredChunk]) -> String {
        results
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Document};

    #[test]
    fn test_user_prompt_embeds_question_and_context() {
        let prompt = PromptBuilder::user_prompt("What is Rust?", "Rust is a language.");
        assert!(prompt.contains("Question: What is Rust?"));
        assert!(prompt.contains("Context: Rust is a language."));
    }

    #[test]
    fn test_context_joins_with_blank_lines() {
        let doc = Document::new("doc.txt", "");
        let results = vec![
            ScoredChunk {
                chunk: Chunk::new(&doc, "first".into(), 0, 0, 5),
                similarity: 0.9,
            },
            ScoredChunk {
                chunk: Chunk::new(&doc, "second".into(), 1, 5, 11),
                similarity: 0.5,
            },
        ];
        assert_eq!(PromptBuilder::build_context(&results), "first\n\nsecond");
    }

    #[test]
    fn test_empty_context_for_plain_chat() {
        assert_eq!(PromptBuilder::build_context(&[]), "");
    }
}
