//! Ephemeral similarity index over the fragments of one document.

mod in_memory;

pub use in_memory::InMemoryIndex;

use thiserror::Error;

use crate::{document::Fragment, embeddings::EmbedderError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VectorStoreError {
    #[error("No fragments available to query")]
    NoFragmentsAvailable,
    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Failed to embed: {0}")]
    Embedding(#[from] EmbedderError),
}

/// A fragment returned by a similarity query along with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f64,
}

/// Fragments ranked by non-increasing similarity to a query.
pub type RetrievalResult = Vec<ScoredFragment>;

/// Cosine similarity of two vectors of equal length, `0.0` if either has zero norm
/// or the result overflows.
pub(crate) fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}
