//! Vector indexing: embedding providers, storage backends, and the
//! [`EmbeddingIndex`] facade that ties them together.
//!
//! Index writes degrade rather than abort: a document whose embedding call
//! keeps failing is stored under a zero vector so the batch as a whole
//! survives. Single-document updates and query embedding raise instead,
//! since a degraded query vector would silently return garbage.

pub mod embeddings;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::retry::RetryPolicy;
use crate::types::{ExtractError, IndexedDocument, Metadata, QueryHit};

pub use embeddings::{EmbeddingProvider, EmbeddingTask, GeminiEmbeddings, MockEmbeddingProvider};
pub use memory::InMemoryStore;
pub use sqlite::SqliteQuestionStore;

/// Storage backend for embedded documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace documents by id, together with their vectors.
    async fn upsert(&self, entries: Vec<(IndexedDocument, Vec<f32>)>) -> Result<(), ExtractError>;

    /// Return the `n` nearest documents by cosine distance, optionally
    /// restricted to documents whose metadata matches every `filter` entry.
    async fn query(
        &self,
        vector: &[f32],
        n: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>, ExtractError>;

    async fn count(&self) -> Result<usize, ExtractError>;
}

/// Embedding-backed document index.
///
/// Pairs an [`EmbeddingProvider`] with a [`VectorStore`] and applies the
/// retry policy at every provider call site.
#[derive(Clone)]
pub struct EmbeddingIndex {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    retry: RetryPolicy,
}

impl EmbeddingIndex {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            store,
            retry,
        }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    /// Embed a document with retries. Exhaustion is an error.
    pub async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ExtractError> {
        let text = text.to_string();
        self.retry
            .run(|_| {
                let text = text.clone();
                async move { self.provider.embed(&text, EmbeddingTask::Document).await }
            })
            .await
    }

    /// Embed a query with retries. Exhaustion is an error.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ExtractError> {
        let text = text.to_string();
        self.retry
            .run(|_| {
                let text = text.clone();
                async move { self.provider.embed(&text, EmbeddingTask::Query).await }
            })
            .await
    }

    /// Embed a batch of documents, degrading failed items to zero vectors.
    ///
    /// Never fails: an item whose retries are exhausted is logged and gets a
    /// zero vector of the provider's dimension so the rest of the batch is
    /// unaffected.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            match self.embed_document(text).await {
                Ok(vector) => vectors.push(vector),
                Err(err) => {
                    warn!(item = i, error = %err, "embedding failed, storing zero vector");
                    vectors.push(vec![0.0; self.provider.dimension()]);
                }
            }
        }
        vectors
    }

    /// Embed and upsert a batch of documents. Returns the number stored.
    pub async fn add(&self, documents: Vec<IndexedDocument>) -> Result<usize, ExtractError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed_batch(&texts).await;
        let count = documents.len();
        self.store
            .upsert(documents.into_iter().zip(vectors).collect())
            .await?;
        Ok(count)
    }

    /// Re-embed and replace a single document. Unlike [`Self::add`], an
    /// embedding failure here propagates.
    pub async fn update(&self, document: IndexedDocument) -> Result<(), ExtractError> {
        let vector = self.embed_document(&document.text).await?;
        self.store.upsert(vec![(document, vector)]).await
    }

    /// Embed the query text and return the nearest documents.
    pub async fn query(
        &self,
        text: &str,
        n: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>, ExtractError> {
        let vector = self.embed_query(text).await?;
        self.store.query(&vector, n, filter).await
    }

    pub async fn count(&self) -> Result<usize, ExtractError> {
        self.store.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Provider that fails the first `failures` calls, then succeeds.
    struct FlakyProvider {
        failures: Mutex<u32>,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str, _task: EmbeddingTask) -> Result<Vec<f32>, ExtractError> {
            let mut left = self.failures.lock();
            if *left > 0 {
                *left -= 1;
                return Err(ExtractError::EmbeddingService("unavailable".into()));
            }
            Ok(vec![1.0; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    fn index_with(failures: u32) -> EmbeddingIndex {
        EmbeddingIndex::new(
            Arc::new(FlakyProvider {
                failures: Mutex::new(failures),
                dimension: 4,
            }),
            Arc::new(InMemoryStore::new()),
            RetryPolicy::zero_delay(3),
        )
    }

    #[tokio::test]
    async fn add_survives_transient_embedding_failures() {
        let index = index_with(2);
        let stored = index
            .add(vec![IndexedDocument::new("q-1", "find x")])
            .await
            .unwrap();
        assert_eq!(stored, 1);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausted_batch_item_degrades_to_zero_vector() {
        // 3 retries all fail for the first item, so it lands as a zero
        // vector; the add still succeeds.
        let index = index_with(3);
        let stored = index
            .add(vec![
                IndexedDocument::new("q-1", "find x"),
                IndexedDocument::new("q-2", "find y"),
            ])
            .await
            .unwrap();
        assert_eq!(stored, 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_propagates_exhaustion() {
        let index = index_with(3);
        let err = index
            .update(IndexedDocument::new("q-1", "find x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn query_round_trips_through_store() {
        let index = index_with(0);
        index
            .add(vec![IndexedDocument::new("q-1", "find x")])
            .await
            .unwrap();
        let hits = index.query("find x", 5, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "q-1");
    }
}
