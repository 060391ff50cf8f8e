//! The two-stage query pipeline: retrieve context, then generate an answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    completion::{AnswerGenerator, CompletionModel},
    config::PipelineConfig,
    document::Document,
    embeddings::EmbeddingModel,
    error::{Error, Result},
    fragmenter::Fragmenter,
    retrieval::Retriever,
    sources::{Source, SourceExtractor},
    vector_store::{InMemoryIndex, RetrievalResult},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub document: Document,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Where a [`QueryState`] is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieve,
    Generate,
    Done,
}

/// Per-request state, filled in one stage at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub question: String,
    pub context: RetrievalResult,
    pub answer: String,
    stage: Stage,
}

impl QueryState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
            answer: String::new(),
            stage: Stage::Retrieve,
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn set_context(&mut self, context: RetrievalResult) {
        debug_assert_eq!(self.stage, Stage::Retrieve);
        self.context = context;
        self.stage = Stage::Generate;
    }

    fn set_answer(&mut self, answer: String) {
        debug_assert_eq!(self.stage, Stage::Generate);
        self.answer = answer;
        self.stage = Stage::Done;
    }
}

/// Answers questions about a document with citations.
///
/// Nothing is kept between runs, every call fragments and indexes the document
/// from scratch. One pipeline can serve concurrent requests.
pub struct QueryPipeline {
    config: PipelineConfig,
    fragmenter: Fragmenter,
    retriever: Retriever,
    generator: AnswerGenerator,
    sources: SourceExtractor,
    embedding_model: Arc<dyn EmbeddingModel>,
}

impl QueryPipeline {
    /// Creates a pipeline with the default [`PipelineConfig`].
    pub fn new(
        embedding_model: Arc<dyn EmbeddingModel>,
        completion_model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self::build(embedding_model, completion_model, PipelineConfig::default())
    }

    pub fn with_config(
        embedding_model: Arc<dyn EmbeddingModel>,
        completion_model: Arc<dyn CompletionModel>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(embedding_model, completion_model, config))
    }

    fn build(
        embedding_model: Arc<dyn EmbeddingModel>,
        completion_model: Arc<dyn CompletionModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            fragmenter: Fragmenter::from_config(&config),
            retriever: Retriever::new(config.context_top_k),
            generator: AnswerGenerator::new(completion_model),
            sources: SourceExtractor::new(config.max_sources, config.excerpt_chars),
            embedding_model,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the whole pipeline for one request.
    ///
    /// Either a complete response is returned or an error, never a partial answer.
    /// When a timeout is configured it bounds the whole run.
    #[instrument(
        skip_all,
        fields(
            request_id = %Uuid::new_v4(),
            document_id = %request.document.id,
            pages = request.document.contents.len()
        )
    )]
    pub async fn run(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let result = match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, self.execute(request))
                .await
                .unwrap_or(Err(Error::Timeout(limit))),
            None => self.execute(request).await,
        };
        if let Err(e) = &result {
            error!(kind = ?e.kind(), error = %e, "Query failed");
        }
        result
    }

    /// Fragments `document` and embeds the fragments into a fresh index.
    pub async fn index_document(&self, document: &Document) -> Result<InMemoryIndex> {
        if document.is_empty() {
            return Err(Error::EmptyDocument);
        }
        let fragments = self.fragmenter.fragment(document);
        info!(fragments = fragments.len(), "Document fragmented");
        Ok(InMemoryIndex::build(fragments, self.embedding_model.clone()).await?)
    }

    async fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let index = self.index_document(&request.document).await?;
        let mut state = QueryState::new(request.query.as_str());

        let context = self.retriever.retrieve(&index, &state.question).await?;
        info!(
            fragments = context.len(),
            top_k = self.retriever.top_k(),
            "Context retrieved"
        );
        state.set_context(context);

        let generate = async {
            self.generator
                .generate(&state.question, &state.context)
                .await
                .map_err(Error::from)
        };
        let cite = async {
            self.sources
                .extract_sources(&index, &state.question)
                .await
                .map_err(Error::from)
        };
        let (answer, sources) = tokio::try_join!(generate, cite)?;
        state.set_answer(answer);
        info!(
            answer_chars = state.answer.len(),
            sources = sources.len(),
            "Answer generated"
        );

        Ok(QueryResponse {
            answer: state.answer,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        error::ErrorKind,
        test_utils::{
            EchoFirstSentence, FailingCompletion, FailingEmbedding, FixedCompletion,
            KeywordEmbedding, RecordingCompletion, SlowCompletion,
        },
    };

    const SKY: &str = "The sky is blue. The grass is green.";

    fn request(contents: Vec<&str>, query: &str) -> QueryRequest {
        QueryRequest {
            document: Document::new(
                "doc-1",
                "Colors",
                contents.into_iter().map(String::from).collect(),
            ),
            query: query.to_string(),
        }
    }

    fn keywords() -> Arc<KeywordEmbedding> {
        Arc::new(KeywordEmbedding::new(&["sky", "grass", "sea"]))
    }

    fn sentence_config() -> PipelineConfig {
        PipelineConfig {
            max_fragment_size: 20,
            fragment_overlap: 5,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_state_stages() {
        let mut state = QueryState::new("q");
        assert_eq!(state.stage(), Stage::Retrieve);
        assert!(state.context.is_empty() && state.answer.is_empty());
        state.set_context(Vec::new());
        assert_eq!(state.stage(), Stage::Generate);
        state.set_answer("a".to_string());
        assert_eq!(state.stage(), Stage::Done);
        assert_eq!(state.answer, "a");
    }

    #[tokio::test]
    async fn test_single_fragment_document() {
        let pipeline = QueryPipeline::new(keywords(), Arc::new(EchoFirstSentence));
        let response = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap();

        assert_eq!(response.answer, "The sky is blue.");
        assert_eq!(
            response.sources,
            vec![Source {
                text: SKY.to_string(),
                page: 1
            }]
        );
    }

    #[tokio::test]
    async fn test_context_ranked_by_similarity() {
        let recorder = Arc::new(RecordingCompletion::default());
        let pipeline =
            QueryPipeline::with_config(keywords(), recorder.clone(), sentence_config()).unwrap();
        let response = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "What color is the sky?");
        assert_eq!(seen[0].1, "The sky is blue.\n\nThe grass is green.");

        assert_eq!(response.answer, "recorded");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].text, "The sky is blue.");
        assert_eq!(response.sources[1].text, "The grass is green.");
    }

    #[tokio::test]
    async fn test_answer_from_best_fragment() {
        let pipeline =
            QueryPipeline::with_config(keywords(), Arc::new(EchoFirstSentence), sentence_config())
                .unwrap();
        let response = pipeline
            .run(&request(vec![SKY], "Is the grass green?"))
            .await
            .unwrap();
        assert_eq!(response.answer, "The grass is green.");
        assert_eq!(response.sources[0].text, "The grass is green.");
    }

    #[tokio::test]
    async fn test_sources_cite_pages() {
        let pipeline = QueryPipeline::new(keywords(), Arc::new(EchoFirstSentence));
        let response = pipeline
            .run(&request(
                vec!["The sea is deep.", "", "Grass covers the hills.", "The sky at night."],
                "Where is the grass?",
            ))
            .await
            .unwrap();

        assert_eq!(response.answer, "Grass covers the hills.");
        assert_eq!(response.sources.len(), 3);
        assert_eq!(response.sources[0].page, 3);
        assert_eq!(
            response.sources.iter().map(|s| s.page).collect::<Vec<_>>(),
            vec![3, 1, 4]
        );
    }

    #[tokio::test]
    async fn test_empty_document() {
        let pipeline = QueryPipeline::new(keywords(), Arc::new(EchoFirstSentence));

        let error = pipeline.run(&request(vec![], "anything")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::EmptyDocument);

        let error = pipeline
            .run(&request(vec!["", "  \n "], "anything"))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::EmptyDocument));
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_generation() {
        let recorder = Arc::new(RecordingCompletion::default());
        let pipeline = QueryPipeline::new(Arc::new(FailingEmbedding), recorder.clone());
        let error = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::EmbeddingFailure);
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure() {
        let pipeline = QueryPipeline::new(keywords(), Arc::new(FailingCompletion));
        let error = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::GenerationFailure);

        let pipeline = QueryPipeline::new(keywords(), Arc::new(FixedCompletion(String::new())));
        let error = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Generation(crate::completion::CompletionError::EmptyResponse)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let config = PipelineConfig {
            timeout_secs: Some(1),
            ..PipelineConfig::default()
        };
        let pipeline = QueryPipeline::with_config(
            keywords(),
            Arc::new(SlowCompletion(Duration::from_secs(30))),
            config,
        )
        .unwrap();
        let error = pipeline
            .run(&request(vec![SKY], "What color is the sky?"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert!(matches!(error, Error::Timeout(limit) if limit == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let pipeline =
            QueryPipeline::with_config(keywords(), Arc::new(EchoFirstSentence), sentence_config())
                .unwrap();
        let request = request(vec![SKY, "The sea is wide. The sky is grey."], "sky?");

        let first = pipeline.run(&request).await.unwrap();
        let second = pipeline.run(&request).await.unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_index_document() {
        let pipeline =
            QueryPipeline::with_config(keywords(), Arc::new(EchoFirstSentence), sentence_config())
                .unwrap();
        let index = pipeline
            .index_document(&Document::new("d", "t", vec![SKY.to_string()]))
            .await
            .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), Some(3));
    }

    #[test]
    fn test_invalid_config() {
        let config = PipelineConfig {
            fragment_overlap: 2000,
            ..PipelineConfig::default()
        };
        let result = QueryPipeline::with_config(keywords(), Arc::new(EchoFirstSentence), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_is_kept() {
        let pipeline = QueryPipeline::new(keywords(), Arc::new(EchoFirstSentence));
        assert_eq!(pipeline.config(), &PipelineConfig::default());

        let pipeline =
            QueryPipeline::with_config(keywords(), Arc::new(EchoFirstSentence), sentence_config())
                .unwrap();
        assert_eq!(pipeline.config().max_fragment_size, 20);
        assert_eq!(pipeline.config().fragment_overlap, 5);
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{
            "document": {
                "id": "42",
                "title": "Notes",
                "description": "weekly notes",
                "createdAt": "2024-05-01",
                "fileSize": 10,
                "pages": 1,
                "contents": ["hello"]
            },
            "query": "what?"
        }"#;
        let request: QueryRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.query, "what?");
        assert_eq!(request.document.description.as_deref(), Some("weekly notes"));

        let response = QueryResponse {
            answer: "hi".to_string(),
            sources: vec![Source {
                text: "hello".to_string(),
                page: 1,
            }],
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"answer":"hi","sources":[{"text":"hello","page":1}]}"#
        );
    }
}
