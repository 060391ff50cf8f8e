use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 1000;
pub const DEFAULT_FRAGMENT_OVERLAP: usize = 200;
pub const DEFAULT_CONTEXT_TOP_K: usize = 4;
pub const DEFAULT_MAX_SOURCES: usize = 3;
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to deserialize json config: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Failed to fetch env var `{var}`: {source}")]
    MissingEnvVar {
        var: String,
        #[source]
        source: std::env::VarError,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Reads an API key from the environment variable named `var`.
pub fn api_key_from_env(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|source| ConfigError::MissingEnvVar {
        var: var.to_string(),
        source,
    })
}

/// Tuning knobs for a [`QueryPipeline`](crate::pipeline::QueryPipeline).
///
/// Every field is optional in the json form, missing fields take the defaults.
/// ```json
/// {
///     "max_fragment_size": 1000,
///     "fragment_overlap": 200,
///     "context_top_k": 4,
///     "max_sources": 3,
///     "excerpt_chars": 200,
///     "timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on a fragment's length, in characters.
    pub max_fragment_size: usize,
    /// Characters shared by consecutive fragments of the same page.
    pub fragment_overlap: usize,
    /// Number of fragments handed to the generation model.
    pub context_top_k: usize,
    /// Number of citations returned with an answer.
    pub max_sources: usize,
    /// Excerpt length of a citation before it gets clipped.
    pub excerpt_chars: usize,
    /// Budget for a whole pipeline run, unbounded when `None`.
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
            fragment_overlap: DEFAULT_FRAGMENT_OVERLAP,
            context_top_k: DEFAULT_CONTEXT_TOP_K,
            max_sources: DEFAULT_MAX_SOURCES,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a json config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fragment_size == 0 {
            return Err(ConfigError::Invalid(
                "max_fragment_size must be greater than 0".to_string(),
            ));
        }
        if self.fragment_overlap >= self.max_fragment_size {
            return Err(ConfigError::Invalid(format!(
                "fragment_overlap ({}) must be smaller than max_fragment_size ({})",
                self.fragment_overlap, self.max_fragment_size
            )));
        }
        if self.context_top_k == 0 {
            return Err(ConfigError::Invalid(
                "context_top_k must be greater than 0".to_string(),
            ));
        }
        if self.max_sources == 0 {
            return Err(ConfigError::Invalid(
                "max_sources must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
