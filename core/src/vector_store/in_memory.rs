use std::sync::Arc;

use tracing::{debug, instrument};

use super::{cosine_similarity, RetrievalResult, ScoredFragment, VectorStoreError};
use crate::{
    document::Fragment,
    embeddings::{EmbedderError, Embedding, EmbeddingModel},
};

/// An immutable, in-memory index of fragment embeddings.
///
/// Built once per request and dropped with it. Queries only take `&self`, so a
/// built index can be shared between concurrent readers.
pub struct InMemoryIndex {
    embeddings: Vec<Embedding>,
    model: Arc<dyn EmbeddingModel>,
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("len", &self.embeddings.len())
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl InMemoryIndex {
    /// Embeds every fragment with `model` and keeps the pairs in fragment order.
    ///
    /// Building over no fragments succeeds without calling the model, queries
    /// against such an index fail with [`VectorStoreError::NoFragmentsAvailable`].
    #[instrument(skip_all, fields(fragments = fragments.len()))]
    pub async fn build(
        fragments: Vec<Fragment>,
        model: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, VectorStoreError> {
        if fragments.is_empty() {
            debug!("No fragments to embed");
            return Ok(Self {
                embeddings: Vec::new(),
                model,
            });
        }

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let vectors = model.embed_batch(&texts).await?;
        if vectors.len() != fragments.len() {
            return Err(EmbedderError::CountMismatch {
                expected: fragments.len(),
                actual: vectors.len(),
            }
            .into());
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                found: bad.len(),
            });
        }

        let embeddings: Vec<Embedding> = fragments
            .into_iter()
            .zip(vectors)
            .map(|(fragment, embedded_data)| Embedding {
                fragment,
                embedded_data,
            })
            .collect();
        debug!(count = embeddings.len(), dimension, "Index built");

        Ok(Self { embeddings, model })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Length of the stored vectors, `None` for an empty index.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(|e| e.embedded_data.len())
    }

    #[must_use]
    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Embeds `text` and returns the `k` most similar fragments.
    /// `k` is clamped to the number of indexed fragments.
    #[instrument(skip(self, text), fields(index_len = self.embeddings.len()))]
    pub async fn query(&self, text: &str, k: usize) -> Result<RetrievalResult, VectorStoreError> {
        let dimension = self
            .dimension()
            .ok_or(VectorStoreError::NoFragmentsAvailable)?;

        let query = self.model.embed(text).await?;
        if query.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                found: query.len(),
            });
        }
        Ok(self.top_n(&query, k))
    }

    /// Ranks the stored fragments against an already embedded query.
    /// Equal scores keep their fragment order.
    #[must_use]
    pub fn top_n(&self, query: &[f64], n: usize) -> RetrievalResult {
        let mut results = self
            .embeddings
            .iter()
            .map(|embedding| ScoredFragment {
                score: cosine_similarity(query, &embedding.embedded_data),
                fragment: embedding.fragment.clone(),
            })
            .collect::<Vec<_>>();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(n);
        results
    }
}
