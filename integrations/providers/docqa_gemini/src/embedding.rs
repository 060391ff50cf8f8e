use async_trait::async_trait;
use docqa::{
    config::{api_key_from_env, ConfigError},
    embeddings::{EmbedderError, EmbeddingModel},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use crate::{error_body, Content, API_KEY_ENV_VAR, BASE_URL};

const DEFAULT_MODEL: &str = "embedding-001";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

/// Embeddings from the Gemini API.
///
/// Fragments are embedded in one `batchEmbedContents` call as retrieval documents,
/// questions go through `embedContent` as retrieval queries.
///
/// # Supported Configuration
///
/// - `model`(optional): `embedding-001` by default
/// - `api_key_var`(optional): environment variable holding the API key,
///   `GOOGLE_API_KEY` by default
/// - `api_url`(optional): API base URL
pub struct GeminiEmbedding {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    model: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: TaskType,
}

#[derive(Serialize, Debug)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Deserialize, Debug)]
struct ContentEmbedding {
    values: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbedding {
    /// Creates a model from an optional JSON configuration string.
    ///
    /// # Errors
    /// - The JSON is malformed or has unknown fields
    /// - The API key environment variable is not set
    pub fn new(json_config: Option<&str>) -> Result<Self, ConfigError> {
        let config = match json_config {
            Some(json) => serde_json::from_str::<ModelConfig>(json)?,
            None => ModelConfig::default(),
        };
        let api_key = api_key_from_env(config.api_key_var.as_deref().unwrap_or(API_KEY_ENV_VAR))?;
        Ok(Self::with_api_key(
            api_key,
            config.api_url.unwrap_or(BASE_URL.to_string()),
            config.model.unwrap_or(DEFAULT_MODEL.to_string()),
        ))
    }

    pub fn with_api_key(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            model: model.into(),
        }
    }

    fn request(&self, text: &str, task_type: TaskType) -> EmbedRequest {
        EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content::text(None, text),
            task_type,
        }
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, EmbedderError> {
        let url = format!("{}/models/{}:{method}", self.api_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Request failed");
                EmbedderError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, method, "Received API response");
        if !status.is_success() {
            let error_msg = error_body(response).await;
            error!(%status, error = %error_msg, "API returned error response");
            return Err(EmbedderError::ProviderError(status.into(), error_msg));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| EmbedderError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingModel for GeminiEmbedding {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn embed(&self, data: &str) -> Result<Vec<f64>, EmbedderError> {
        let body = self.request(data, TaskType::RetrievalQuery);
        let response: EmbedResponse = self.post("embedContent", &body).await?;
        Ok(response.embedding.values)
    }

    #[instrument(skip_all, fields(model = %self.model, inputs = data.len()))]
    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let body = BatchEmbedRequest {
            requests: data
                .iter()
                .map(|text| self.request(text, TaskType::RetrievalDocument))
                .collect(),
        };
        let response: BatchEmbedResponse = self.post("batchEmbedContents", &body).await?;
        if response.embeddings.len() != data.len() {
            return Err(EmbedderError::CountMismatch {
                expected: data.len(),
                actual: response.embeddings.len(),
            });
        }
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}
