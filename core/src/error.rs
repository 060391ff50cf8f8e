use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::{
    completion::CompletionError, config::ConfigError, embeddings::EmbedderError,
    vector_store::VectorStoreError,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Document has no text to query")]
    EmptyDocument,
    #[error("No fragments available to query")]
    NoFragmentsAvailable,
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedderError),
    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Generation failed: {0}")]
    Generation(#[from] CompletionError),
    #[error("Pipeline timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<VectorStoreError> for Error {
    fn from(value: VectorStoreError) -> Self {
        match value {
            VectorStoreError::NoFragmentsAvailable => Self::NoFragmentsAvailable,
            VectorStoreError::DimensionMismatch { expected, found } => {
                Self::DimensionMismatch { expected, found }
            }
            VectorStoreError::Embedding(e) => Self::Embedding(e),
        }
    }
}

/// Coarse classification of an [`Error`], meant for callers that map failures to
/// their own responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyDocument,
    NoFragmentsAvailable,
    EmbeddingFailure,
    GenerationFailure,
    Timeout,
    Config,
}

/// Serializable error payload: the kind plus a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyDocument => ErrorKind::EmptyDocument,
            Self::NoFragmentsAvailable => ErrorKind::NoFragmentsAvailable,
            Self::Embedding(_) | Self::DimensionMismatch { .. } => ErrorKind::EmbeddingFailure,
            Self::Generation(_) => ErrorKind::GenerationFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
