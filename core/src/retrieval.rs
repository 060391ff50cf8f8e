use tracing::instrument;

use crate::{
    config::DEFAULT_CONTEXT_TOP_K,
    vector_store::{InMemoryIndex, RetrievalResult, VectorStoreError},
};

/// Fetches the generation context for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retriever {
    top_k: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_TOP_K)
    }
}

impl Retriever {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[instrument(skip_all, fields(top_k = self.top_k))]
    pub async fn retrieve(
        &self,
        index: &InMemoryIndex,
        question: &str,
    ) -> Result<RetrievalResult, VectorStoreError> {
        index.query(question, self.top_k).await
    }
}
