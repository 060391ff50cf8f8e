use crate::embeddings::EmbedderError;
use async_trait::async_trait;

/// A text embedding capability.
///
/// Vectors returned for identical input by the same provider configuration must be
/// comparable by cosine similarity.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, data: &str) -> Result<Vec<f64>, EmbedderError>;

    /// Embeds several inputs, returning one vector per input in the same order.
    ///
    /// Defaults to calling [`embed`](EmbeddingModel::embed) once per input, providers
    /// that accept batched requests should override it.
    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(data.len());
        for text in data {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}
