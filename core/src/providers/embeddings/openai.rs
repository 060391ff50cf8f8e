use crate::{
    config::{api_key_from_env, ConfigError},
    embeddings::{model::EmbeddingModel, EmbedderError},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

const API_KEY_ENV_VAR: &str = "DOCQA_OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
}

/// Embeddings from the OpenAI `/v1/embeddings` endpoint, or any endpoint speaking
/// the same protocol.
///
/// # Supported Configuration
///
/// - `model`(optional): model identifier, `text-embedding-3-small` by default
/// - `api_key_var`(optional): environment variable holding the API key,
///   `DOCQA_OPENAI_API_KEY` by default
/// - `api_url`(optional): custom endpoint URL
pub struct OpenAIEmbeddingModel {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAIEmbeddingModel {
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
            config.api_url.unwrap_or(URL.to_string()),
            config.model.unwrap_or(DEFAULT_MODEL.to_string()),
        ))
    }

    pub fn with_api_key(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            model: model.into(),
        }
    }

    async fn request(&self, input: Value) -> Result<Vec<Vec<f64>>, EmbedderError> {
        let request_body = json!({
                "input": input,
                "model": self.model,
        });
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Request failed");
                EmbedderError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, "Received API response");

        if status.is_success() {
            let mut response = response
                .json::<OpenAIEmbeddingResponse>()
                .await
                .map_err(|e| EmbedderError::ParseError(e.to_string()))?;
            response.data.sort_by_key(|d| d.index);
            Ok(response.data.into_iter().map(|d| d.embedding).collect())
        } else {
            let error_message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(%status, error = %error_message, "API returned error response");

            Err(EmbedderError::ProviderError(status.into(), error_message))
        }
    }
}

#[derive(Deserialize)]
struct OpenAIEmbeddingResponse {
    pub data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAIEmbeddingData {
    pub embedding: Vec<f64>,
    #[serde(default)]
    pub index: usize,
}

#[async_trait]
impl EmbeddingModel for OpenAIEmbeddingModel {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn embed(&self, data: &str) -> Result<Vec<f64>, EmbedderError> {
        self.request(json!(data))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::ParseError("Response contained no embedding".to_string()))
    }

    #[instrument(skip_all, fields(model = %self.model, inputs = data.len()))]
    async fn embed_batch(&self, data: &[String]) -> Result<Vec<Vec<f64>>, EmbedderError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request(json!(data)).await?;
        if vectors.len() != data.len() {
            return Err(EmbedderError::CountMismatch {
                expected: data.len(),
                actual: vectors.len(),
            });
        }
        Ok(vectors)
    }
}
