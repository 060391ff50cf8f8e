use crate::completion::{CompletionError, CompletionModel, Message, PromptTemplate};
use crate::config::{api_key_from_env, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument};

const API_KEY_ENV_VAR: &str = "DOCQA_OPENAI_API_KEY";
const URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TEMP: f64 = 0.0;
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TOKENS: usize = 2400;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfig {
    api_key_var: Option<String>,
    api_url: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<usize>,
}

/// Answers through the OpenAI chat completions API, or any endpoint speaking the
/// same protocol.
///
/// The question and context are rendered with a [`PromptTemplate`], the grounded
/// question-answering prompt unless replaced with [`with_prompt`](Self::with_prompt).
///
/// # Supported Configuration
///
/// - `model`(optional): `gpt-4o-mini` by default
/// - `api_key_var`(optional): environment variable holding the API key,
///   `DOCQA_OPENAI_API_KEY` by default
/// - `api_url`(optional): custom endpoint URL
/// - `temperature`(optional): sampling temperature, `0.0` by default
/// - `max_tokens`(optional): answer length limit, `2400` by default
pub struct OpenAICompletionModel {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f64,
    max_tokens: usize,
    prompt: PromptTemplate,
}

impl OpenAICompletionModel {
    /// Creates a model from an optional JSON configuration string.
    ///
    /// # Errors
    /// - The JSON is malformed or has unknown fields
    /// - The API key environment variable is not set
    #[instrument]
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
            config.api_url.unwrap_or(URL.to_string()),
            config.model.unwrap_or(DEFAULT_MODEL.to_string()),
        );
        model.temperature = config.temperature.unwrap_or(DEFAULT_TEMP);
        model.max_tokens = config.max_tokens.unwrap_or(DEFAULT_TOKENS);
        Ok(model)
    }

    pub fn with_api_key(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: api_url.into(),
            client: reqwest::Client::new(),
            model: model.into(),
            temperature: DEFAULT_TEMP,
            max_tokens: DEFAULT_TOKENS,
            prompt: PromptTemplate::default(),
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }
}

#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(tag = "role", content = "content")]
#[allow(non_camel_case_types)]
enum OpenAIMessage {
    system(String),
    user(String),
}

impl From<Message> for OpenAIMessage {
    fn from(value: Message) -> OpenAIMessage {
        match value {
            Message::Preamble(s) => OpenAIMessage::system(s),
            Message::User(s) => OpenAIMessage::user(s),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAICompletionModel {
    #[instrument(skip_all, fields(model = %self.model, context_chars = context.len()))]
    async fn generate(&self, question: &str, context: &str) -> Result<String, CompletionError> {
        let messages: Vec<OpenAIMessage> = self
            .prompt
            .messages(question, context)
            .into_iter()
            .map(Into::into)
            .collect();

        let request_body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        debug!(message_count = messages.len(), "Sending request to OpenAI");

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
                CompletionError::RequestError(e.to_string())
            })?;

        let status = response.status();
        debug!(%status, "Received API response");

        if !status.is_success() {
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());
            error!(
                status = %status,
                error = %error_msg,
                "API returned error response"
            );
            return Err(CompletionError::ProviderError(status.into(), error_msg));
        }

        let response_json: serde_json::Value = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse response JSON");
            CompletionError::ParseError(e.to_string())
        })?;

        let answer = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompletionError::ParseError("Invalid response body".to_string()))?
            .to_string();

        let usage = &response_json["usage"];
        info!(
            prompt_tokens = usage["prompt_tokens"].as_u64(),
            completion_tokens = usage["completion_tokens"].as_u64(),
            total_tokens = usage["total_tokens"].as_u64(),
            "Token usage recorded"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn model(server: &mockito::Server) -> OpenAICompletionModel {
        OpenAICompletionModel::with_api_key(
            "test-key",
            format!("{}/v1/chat/completions", server.url()),
            "gpt-4o-mini",
        )
    }

    #[test]
    fn test_message_serialization() {
        let value = serde_json::to_value(OpenAIMessage::from(Message::User("hi".to_string())))
            .unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hi"}));
        let value =
            serde_json::to_value(OpenAIMessage::from(Message::Preamble("be nice".to_string())))
                .unwrap();
        assert_eq!(value, json!({"role": "system", "content": "be nice"}));
    }

    #[test]
    fn test_unknown_config_field() {
        let result = OpenAICompletionModel::new(Some(r#"{"temp": 1.0}"#));
        assert!(matches!(result, Err(ConfigError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_generate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "model": "gpt-4o-mini",
                    "temperature": 0.0,
                    "max_tokens": 2400
                })),
                Matcher::Regex("Question: What color is the sky".to_string()),
                Matcher::Regex("Context: The sky is blue.".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [{"index": 0, "message": {"role": "assistant", "content": "The sky is blue."}}],
                    "usage": {"prompt_tokens": 80, "completion_tokens": 5, "total_tokens": 85}
                }"#,
            )
            .create_async()
            .await;

        let answer = model(&server)
            .generate("What color is the sky?", "The sky is blue.")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(answer, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_custom_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "messages": [
                    {"role": "system", "content": "Cite pages."},
                    {"role": "user", "content": "ctx => q"}
                ]
            })))
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"content": "ok"}}]}"#)
            .create_async()
            .await;

        let prompt = PromptTemplate::new("{context} => {question}")
            .unwrap()
            .with_preamble("Cite pages.");
        let answer = model(&server)
            .with_prompt(prompt)
            .generate("q", "ctx")
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(answer, "ok");
    }

    #[tokio::test]
    async fn test_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let result = model(&server).generate("q", "c").await;
        assert_eq!(
            result.unwrap_err(),
            CompletionError::ProviderError(401, "invalid api key".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let result = model(&server).generate("q", "c").await;
        assert!(matches!(result, Err(CompletionError::ParseError(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn simple_openai_completion_request() {
        tracing_subscriber::fmt().init();
        let openai_completion_model = OpenAICompletionModel::new(None).unwrap();
        let response = openai_completion_model
            .generate("What color is the sky?", "The sky is blue. The grass is green.")
            .await;
        assert!(response.is_ok());
    }
}
