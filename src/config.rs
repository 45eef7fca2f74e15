//! Process-level configuration.
//!
//! A [`QuestsmithConfig`] is constructed once at startup (usually via
//! [`QuestsmithConfig::from_env`]) and passed by reference into component
//! constructors. Core logic never reads the environment on its own.

use std::time::Duration;

use url::Url;

use crate::retry::RetryPolicy;
use crate::types::ExtractError;

const DEFAULT_CONVERSION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";
const DEFAULT_EMBEDDING_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:embedContent";

/// Configuration value object for the extraction pipeline and its services.
#[derive(Clone, Debug)]
pub struct QuestsmithConfig {
    /// API key for the remote generative/embedding services.
    pub api_key: Option<String>,
    /// Endpoint for the markup conversion service.
    pub conversion_endpoint: Url,
    /// Endpoint for the embedding service.
    pub embedding_endpoint: Url,
    /// Dimension of embedding vectors (and of the zero-vector fallback).
    pub embedding_dimension: usize,
    /// Minimum text length below which validation flags a question.
    pub min_question_len: usize,
    /// Default number of results returned by retrieval.
    pub top_k: usize,
    /// Retry policy applied to every external call site.
    pub retry: RetryPolicy,
}

impl Default for QuestsmithConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            conversion_endpoint: Url::parse(DEFAULT_CONVERSION_ENDPOINT)
                .expect("default conversion endpoint is a valid URL"),
            embedding_endpoint: Url::parse(DEFAULT_EMBEDDING_ENDPOINT)
                .expect("default embedding endpoint is a valid URL"),
            embedding_dimension: 768,
            min_question_len: 10,
            top_k: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl QuestsmithConfig {
    /// Build configuration from the environment, loading `.env` if present.
    ///
    /// Recognized variables: `QUESTSMITH_API_KEY`,
    /// `QUESTSMITH_CONVERSION_ENDPOINT`, `QUESTSMITH_EMBEDDING_ENDPOINT`,
    /// `QUESTSMITH_EMBEDDING_DIMENSION`, `QUESTSMITH_TOP_K`,
    /// `QUESTSMITH_RETRY_MAX_ATTEMPTS`. Unset variables fall back to
    /// defaults; malformed values are an [`ExtractError::InvalidInput`].
    pub fn from_env() -> Result<Self, ExtractError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(key) = std::env::var("QUESTSMITH_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(raw) = std::env::var("QUESTSMITH_CONVERSION_ENDPOINT") {
            config.conversion_endpoint = Url::parse(&raw).map_err(|err| {
                ExtractError::InvalidInput(format!("bad conversion endpoint '{raw}': {err}"))
            })?;
        }
        if let Ok(raw) = std::env::var("QUESTSMITH_EMBEDDING_ENDPOINT") {
            config.embedding_endpoint = Url::parse(&raw).map_err(|err| {
                ExtractError::InvalidInput(format!("bad embedding endpoint '{raw}': {err}"))
            })?;
        }
        if let Ok(raw) = std::env::var("QUESTSMITH_EMBEDDING_DIMENSION") {
            config.embedding_dimension = parse_env("QUESTSMITH_EMBEDDING_DIMENSION", &raw)?;
        }
        if let Ok(raw) = std::env::var("QUESTSMITH_TOP_K") {
            config.top_k = parse_env("QUESTSMITH_TOP_K", &raw)?;
        }
        if let Ok(raw) = std::env::var("QUESTSMITH_RETRY_MAX_ATTEMPTS") {
            let attempts: u32 = parse_env("QUESTSMITH_RETRY_MAX_ATTEMPTS", &raw)?;
            config.retry =
                RetryPolicy::new(attempts, Duration::from_secs(4), Duration::from_secs(10));
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ExtractError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|err| ExtractError::InvalidInput(format!("bad {name} '{raw}': {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = QuestsmithConfig::default();
        assert_eq!(config.embedding_dimension, 768);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.min_question_len, 10);
        assert!(config.api_key.is_none());
        assert!(
            config
                .conversion_endpoint
                .as_str()
                .contains("generateContent")
        );
    }
}
