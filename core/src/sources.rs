use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    config::{DEFAULT_EXCERPT_CHARS, DEFAULT_MAX_SOURCES},
    document::Fragment,
    vector_store::{InMemoryIndex, VectorStoreError},
};

/// Appended to an excerpt that was clipped.
pub const TRUNCATION_MARKER: &str = "...";

/// A citation backing an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    pub page: usize,
}

impl Source {
    /// Builds a citation for `fragment`, clipping its text to `max_chars` characters.
    #[must_use]
    pub fn from_fragment(fragment: &Fragment, max_chars: usize) -> Self {
        debug_assert!(fragment.page >= 1, "fragments carry 1-based page numbers");
        Self {
            text: excerpt(&fragment.text, max_chars),
            page: fragment.page,
        }
    }
}

/// Returns `text` unchanged if it fits in `max_chars` characters, otherwise its
/// first `max_chars` characters followed by [`TRUNCATION_MARKER`].
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Turns the best matches for a question into citations.
///
/// Runs its own similarity query, independent from the generation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceExtractor {
    max_sources: usize,
    excerpt_chars: usize,
}

impl Default for SourceExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SOURCES, DEFAULT_EXCERPT_CHARS)
    }
}

impl SourceExtractor {
    #[must_use]
    pub fn new(max_sources: usize, excerpt_chars: usize) -> Self {
        Self {
            max_sources,
            excerpt_chars,
        }
    }

    #[instrument(skip_all, fields(max_sources = self.max_sources))]
    pub async fn extract_sources(
        &self,
        index: &InMemoryIndex,
        question: &str,
    ) -> Result<Vec<Source>, VectorStoreError> {
        Ok(index
            .query(question, self.max_sources)
            .await?
            .iter()
            .map(|r| Source::from_fragment(&r.fragment, self.excerpt_chars))
            .collect())
    }
}
