//! # docqa - Core API Documentation
//!
//! docqa answers a question about a single caller-supplied document. It splits the
//! document into overlapping fragments, builds a throwaway similarity index over
//! them, hands the best matches to a language model and returns the answer along
//! with the excerpts it was based on.
//!
//! ## Features
//!
//! - **Fragmenter**: boundary-aware splitting with page and offset metadata
//! - **In-memory index**: cosine similarity search, rebuilt for every request
//! - **Pluggable models**: embedding and completion providers behind async traits
//! - **Citations**: clipped excerpts with the page they came from
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docqa::prelude::*;
//! use docqa::providers::{completions::OpenAI, embeddings::OpenAIEmbedding};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pipeline = QueryPipeline::new(
//!         Arc::new(OpenAIEmbedding::new(None)?),
//!         Arc::new(OpenAI::new(None)?),
//!     );
//!
//!     let request = QueryRequest {
//!         document: Document::new(
//!             "doc-1",
//!             "Colors",
//!             vec!["The sky is blue. The grass is green.".to_string()],
//!         ),
//!         query: "What color is the sky?".to_string(),
//!     };
//!
//!     let response = pipeline.run(&request).await?;
//!     println!("{}", response.answer);
//!     for source in response.sources {
//!         println!("p.{}: {}", source.page, source.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature flags
//!
//! Name | Description | Default?
//! ---|---|---
//! `pdf` | builds a [`Document`](document::Document) from PDF bytes | No

/// Answer generation and the prompt template
pub mod completion;

/// Pipeline configuration and credential loading
pub mod config;

/// Request documents and the fragments cut from them
pub mod document;

/// Text embeddings support
pub mod embeddings;

/// Error types for all library operations
pub mod error;

/// Splits documents into fragments
pub mod fragmenter;

/// The retrieve-then-generate query pipeline
pub mod pipeline;

/// Builtin completion and embedding model providers
pub mod providers;

/// Context retrieval for generation
pub mod retrieval;

/// Citations returned with an answer
pub mod sources;

/// In-memory similarity index
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_utils;

/// Convenience prelude exports
pub mod prelude {
    pub use crate::completion::{CompletionError, CompletionModel, PromptTemplate};
    pub use crate::config::PipelineConfig;
    pub use crate::document::{Document, Fragment};
    pub use crate::embeddings::{EmbedderError, EmbeddingModel};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::pipeline::{QueryPipeline, QueryRequest, QueryResponse};
    pub use crate::sources::Source;
}

pub use error::{Error, Result};
