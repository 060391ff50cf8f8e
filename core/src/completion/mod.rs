//! Grounded answer generation from retrieved context.

pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::vector_store::ScoredFragment;

pub use prompt::{PromptTemplate, DEFAULT_RAG_PROMPT};

/// Message that'll be sent in Completions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// System prompt
    Preamble(String),
    /// Message sent by the user
    User(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Model returned an empty answer")]
    EmptyResponse,
}

/// A text generation capability.
///
/// Implementations are expected to wrap `question` and `context` in a fixed
/// instructional prompt (see [`PromptTemplate`]) that restricts the answer to the
/// supplied context.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, CompletionError>;
}

/// Joins fragment texts in ranked order, separated by a blank line.
#[must_use]
pub fn join_context(context: &[ScoredFragment]) -> String {
    context
        .iter()
        .map(|r| r.fragment.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turns a question and its retrieved fragments into an answer.
#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn CompletionModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Returns the model's answer verbatim. A blank answer is an error.
    #[instrument(skip_all, fields(fragments = context.len()))]
    pub async fn generate(
        &self,
        question: &str,
        context: &[ScoredFragment],
    ) -> Result<String, CompletionError> {
        let context = join_context(context);
        debug!(context_chars = context.len(), "Generating answer");
        let answer = self.model.generate(question, &context).await?;
        if answer.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(answer)
    }
}
