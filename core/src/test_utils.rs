//! Deterministic stand-ins for the embedding and completion capabilities.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    completion::{CompletionError, CompletionModel},
    embeddings::{EmbedderError, EmbeddingModel},
};

/// Looks vectors up by exact text, unknown text is a provider error.
pub(crate) struct TableEmbedding {
    table: HashMap<String, Vec<f64>>,
    calls: AtomicUsize,
}

impl TableEmbedding {
    pub(crate) fn new(entries: &[(&str, Vec<f64>)]) -> Self {
        Self {
            table: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for TableEmbedding {
    async fn embed(&self, data: &str) -> Result<Vec<f64>, EmbedderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(data)
            .cloned()
            .ok_or_else(|| EmbedderError::ProviderError(404, format!("no vector for `{data}`")))
    }
}

/// One dimension per keyword, valued by how often the keyword occurs in the text.
pub(crate) struct KeywordEmbedding {
    keywords: Vec<String>,
}

impl KeywordEmbedding {
    pub(crate) fn new(keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl EmbeddingModel for KeywordEmbedding {
    async fn embed(&self, data: &str) -> Result<Vec<f64>, EmbedderError> {
        let data = data.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| data.matches(k.as_str()).count() as f64)
            .collect())
    }
}

pub(crate) struct FailingEmbedding;

#[async_trait]
impl EmbeddingModel for FailingEmbedding {
    async fn embed(&self, _data: &str) -> Result<Vec<f64>, EmbedderError> {
        Err(EmbedderError::RequestError("connection refused".to_string()))
    }
}

/// Answers with the first sentence of the context.
pub(crate) struct EchoFirstSentence;

#[async_trait]
impl CompletionModel for EchoFirstSentence {
    async fn generate(&self, _question: &str, context: &str) -> Result<String, CompletionError> {
        Ok(context
            .split_inclusive('.')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Always answers with the same text.
pub(crate) struct FixedCompletion(pub(crate) String);

#[async_trait]
impl CompletionModel for FixedCompletion {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String, CompletionError> {
        Ok(self.0.clone())
    }
}

pub(crate) struct FailingCompletion;

#[async_trait]
impl CompletionModel for FailingCompletion {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String, CompletionError> {
        Err(CompletionError::ProviderError(503, "overloaded".to_string()))
    }
}

/// Remembers every `(question, context)` pair it was called with.
#[derive(Default)]
pub(crate) struct RecordingCompletion {
    pub(crate) seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CompletionModel for RecordingCompletion {
    async fn generate(&self, question: &str, context: &str) -> Result<String, CompletionError> {
        self.seen
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok("recorded".to_string())
    }
}

/// Sleeps before answering.
pub(crate) struct SlowCompletion(pub(crate) Duration);

#[async_trait]
impl CompletionModel for SlowCompletion {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String, CompletionError> {
        tokio::time::sleep(self.0).await;
        Ok("too late".to_string())
    }
}
