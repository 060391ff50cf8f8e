use async_trait::async_trait;
use docqa::{
    completion::{CompletionError, CompletionModel, Message, PromptTemplate},
    config::{api_key_from_env, ConfigError},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::{error_body, Content, Part, API_KEY_ENV_VAR, BASE_URL};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_TEMP: f64 = 0.0;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
}

/// Answers through the Gemini `generateContent` endpoint.
///
/// # Supported Configuration
///
/// - `model`(optional): `gemini-2.0-flash` by default
/// - `api_key_var`(optional): environment variable holding the API key,
///   `GOOGLE_API_KEY` by default
/// - `api_url`(optional): API base URL
/// - `temperature`(optional): `0.0` by default
pub struct GeminiCompletion {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f64,
    prompt: PromptTemplate,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

impl GeminiCompletion {
    /// Creates a model from an optional JSON configuration string.
    ///
    /// # Errors
    /// - The JSON is malformed or has unknown fields
    /// - The API key environment variable is not set
    pub fn new(json_config: Option<&str>) -> Result<Self, ConfigError> {
        let config = match json_config {
            Some(json) => serde_json::from_str::<ModelConfig>(json).map_err(|e| {
                error!(error = %e, "Failed to deserialize json config");
                e
            })?,
            None => ModelConfig::default(),
        };
        let api_key = api_key_from_env(config.api_key_var.as_deref().unwrap_or(API_KEY_ENV_VAR))?;
        let mut model = Self::with_api_key(
            api_key,
            config.api_url.unwrap_or(BASE_URL.to_string()),
            config.model.unwrap_or(DEFAULT_MODEL.to_string()),
        );
        model.temperature = config.temperature.unwrap_or(DEFAULT_TEMP);
        Ok(model)
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
            temperature: DEFAULT_TEMP,
            prompt: PromptTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    fn request(&self, question: &str, context: &str) -> GenerateRequest {
        let mut contents = Vec::new();
        let mut system_instruction = None;
        for message in self.prompt.messages(question, context) {
            match message {
                Message::Preamble(text) => system_instruction = Some(Content::text(None, text)),
                Message::User(text) => contents.push(Content::text(Some("user"), text)),
            }
        }
        GenerateRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl CompletionModel for GeminiCompletion {
    #[instrument(skip_all, fields(model = %self.model, context_chars = context.len()))]
    async fn generate(&self, question: &str, context: &str) -> Result<String, CompletionError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(question, context))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Request failed");
                CompletionError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, "Received API response");
        if !status.is_success() {
            let error_msg = error_body(response).await;
            error!(%status, error = %error_msg, "API returned error response");
            return Err(CompletionError::ProviderError(status.into(), error_msg));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse response JSON");
            CompletionError::ParseError(e.to_string())
        })?;

        let usage = &body.usage_metadata;
        info!(
            prompt_tokens = usage.prompt_token_count,
            completion_tokens = usage.candidates_token_count,
            total_tokens = usage.total_token_count,
            "Token usage recorded"
        );

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| CompletionError::ParseError("Response has no candidates".to_string()))?;
        Ok(content
            .parts
            .into_iter()
            .map(|Part { text }| text)
            .collect::<String>())
    }
}
