//! Interface to the external text-generation service.
//!
//! The retrieval core treats generation as opaque: it hands over the
//! assembled context, the citations and the question, and gets text back.
//! [`PromptTemplate`] renders the instruction prompt for implementations
//! that talk to a chat-completion style API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::ContextCitation;
use crate::error::Result;

/// Sampling options passed through to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    /// Upper bound on the answer length, in tokens.
    pub max_tokens: u32,
    /// Sampling temperature; low values favour factual answers.
    pub temperature: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { max_tokens: 2000, temperature: 0.3 }
    }
}

/// Everything the generation service receives for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// The user's question.
    pub question: String,
    /// The assembled context block.
    pub context: String,
    /// Citations for the passages in `context`.
    pub citations: Vec<ContextCitation>,
    /// Sampling options.
    pub options: GenerationOptions,
}

/// A text-generation backend.
///
/// Implementations must be cancellation-safe: the caller may drop the future
/// when its timeout elapses.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer for the request.
    ///
    /// # Errors
    ///
    /// Implementations report backend failures as
    /// [`RagError::GenerationError`](crate::RagError::GenerationError).
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Renders the system and user prompts sent to a chat model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    /// Describes the assistant's role and answering rules.
    pub system: String,
    /// User prompt with `{context}` and `{question}` placeholders.
    pub user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: "You are a knowledgeable assistant for the products described in the \
                     provided documents. Give detailed, well-structured answers based on the \
                     context. Include specifics such as interest rates, tenure, eligibility \
                     criteria, features and benefits when available. If the information is \
                     not in the context, say so politely."
                .to_string(),
            user: "Based on the following information, provide a detailed and comprehensive \
                   answer to the question.\n\n\
                   Context Information:\n{context}\n\n\
                   Question: {question}\n\n\
                   Instructions:\n\
                   - Provide a detailed answer with specific information from the context\n\
                   - Include relevant details such as interest rates, tenure, eligibility, \
                   features, and benefits\n\
                   - Structure the answer clearly with key points\n\
                   - If multiple schemes are relevant, mention them\n\n\
                   Answer: "
                .to_string(),
        }
    }
}

impl PromptTemplate {
    /// Fill the user prompt for `question` over `context`.
    pub fn render(&self, question: &str, context: &str) -> String {
        // Substitute the question first so context text containing
        // "{question}" is left alone.
        self.user.replacen("{question}", question, 1).replacen("{context}", context, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_fills_placeholders() {
        let prompt = PromptTemplate::default().render("What is the tenure?", "[Source 1: a#0]\nUp to 30 years");
        assert!(prompt.contains("Question: What is the tenure?"));
        assert!(prompt.contains("Context Information:\n[Source 1: a#0]\nUp to 30 years"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn placeholder_text_inside_context_is_preserved() {
        let template = PromptTemplate { system: String::new(), user: "{context}|{question}".into() };
        assert_eq!(template.render("q", "literal {question}"), "literal {question}|q");
    }
}
