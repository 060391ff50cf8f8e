pub mod embedding;
pub mod model;

use thiserror::Error;

pub use embedding::Embedding;
pub use model::EmbeddingModel;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmbedderError {
    #[error("Provider error -> HTTP Status {0}: {1}")]
    ProviderError(u16, String),
    #[error("RequestError: {0}")]
    RequestError(String),
    #[error("ParseError: {0}")]
    ParseError(String),
    #[error("Expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },
}
