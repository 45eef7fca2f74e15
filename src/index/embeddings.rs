//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the seam between the index and whatever produces
//! vectors. [`GeminiEmbeddings`] calls the hosted embedding endpoint;
//! [`MockEmbeddingProvider`] is a deterministic offline stand-in used by
//! tests and local runs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::types::ExtractError;

/// Task hint passed with every embedding request. Documents and queries are
/// embedded asymmetrically.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

impl EmbeddingTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "retrieval_document",
            Self::Query => "retrieval_query",
        }
    }
}

/// Anything that can turn text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, ExtractError>;

    /// Dimension of the vectors this provider produces.
    fn dimension(&self) -> usize;
}

/// Client for the hosted Gemini embedding endpoint.
#[derive(Clone, Debug)]
pub struct GeminiEmbeddings {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

impl GeminiEmbeddings {
    pub fn new(endpoint: Url, api_key: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>, ExtractError> {
        let body = json!({
            "content": { "parts": [{ "text": text }] },
            "taskType": task.as_str(),
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| ExtractError::EmbeddingService(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractError::EmbeddingService(format!(
                "embedding endpoint returned {status}: {detail}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|err| ExtractError::EmbeddingService(err.to_string()))?;

        if parsed.embedding.values.len() != self.dimension {
            return Err(ExtractError::EmbeddingService(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                parsed.embedding.values.len()
            )));
        }
        Ok(parsed.embedding.values)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic hash-based embedder for tests and offline use.
///
/// Each word hashes to a bucket; the bucket counts are L2-normalized so that
/// cosine distance behaves like a crude bag-of-words similarity. Texts that
/// share words land closer than texts that do not.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimension: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dimension: 16 }
    }
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, word: &str) -> usize {
        // FNV-1a, stable across runs unlike the std hasher.
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % self.dimension as u64) as usize
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>, ExtractError> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text.to_lowercase().split_whitespace() {
            vector[self.bucket(word)] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
