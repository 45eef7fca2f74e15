//! Remote markup conversion services.
//!
//! [`ConversionService`] is the seam the pipeline talks to. The hosted
//! implementation asks a generative model to rewrite a question in LaTeX;
//! an empty reply is returned as-is so the caller can fall back to the
//! rule-based converter instead of treating it as a failure.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::retry::RetryPolicy;
use crate::types::ExtractError;

/// Converts question text into LaTeX-style markup.
#[async_trait]
pub trait ConversionService: Send + Sync {
    async fn convert_to_latex(&self, text: &str) -> Result<String, ExtractError>;
}

/// Client for a hosted Gemini `generateContent` endpoint.
#[derive(Clone, Debug)]
pub struct GeminiConverter {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiConverter {
    pub fn new(endpoint: Url, api_key: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
            retry,
        }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Convert the mathematical expressions in the following question to \
             LaTeX. Keep all non-mathematical text unchanged. Reply with the \
             converted question only.\n\n{text}"
        )
    }

    async fn request(&self, text: &str) -> Result<String, ExtractError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(text) }] }],
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| ExtractError::ConversionService(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::ConversionService(format!(
                "conversion endpoint returned {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| ExtractError::ConversionService(err.to_string()))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(strip_code_fences(&text))
    }
}

#[async_trait]
impl ConversionService for GeminiConverter {
    async fn convert_to_latex(&self, text: &str) -> Result<String, ExtractError> {
        let markup = self
            .retry
            .run(|attempt| {
                debug!(attempt, "requesting markup conversion");
                self.request(text)
            })
            .await?;
        Ok(markup)
    }
}

/// Strips a surrounding ```latex / ``` fence if the model wrapped its reply
/// in one.
fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner
        .strip_prefix("latex")
        .or_else(|| inner.strip_prefix("tex"))
        .unwrap_or(inner);
    inner
        .strip_suffix("```")
        .unwrap_or(inner)
        .trim()
        .to_string()
}
