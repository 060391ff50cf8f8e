//! Google Gemini providers for docqa.
//!
//! [`GeminiEmbedding`] implements `docqa::embeddings::EmbeddingModel` on top of the
//! `embedContent` / `batchEmbedContents` endpoints, [`GeminiCompletion`] implements
//! `docqa::completion::CompletionModel` on top of `generateContent`.
//!
//! Both read their API key from `GOOGLE_API_KEY` unless configured otherwise.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docqa::prelude::*;
//! use docqa_gemini::{GeminiCompletion, GeminiEmbedding};
//!
//! # fn build() -> docqa::Result<QueryPipeline> {
//! let pipeline = QueryPipeline::new(
//!     Arc::new(GeminiEmbedding::new(None)?),
//!     Arc::new(GeminiCompletion::new(Some(r#"{"model": "gemini-2.0-flash"}"#))?),
//! );
//! # Ok(pipeline)
//! # }
//! ```

mod completion;
mod embedding;

pub use completion::GeminiCompletion;
pub use embedding::GeminiEmbedding;

use serde::{Deserialize, Serialize};

const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Part {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub(crate) fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Reads the body of a failed response, for error reporting.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string())
}
