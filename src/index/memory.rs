//! Brute-force in-memory vector store for tests and small corpora.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::index::VectorStore;
use crate::types::{ExtractError, IndexedDocument, Metadata, QueryHit};

struct Entry {
    document: IndexedDocument,
    vector: Vec<f32>,
}

/// Vec-backed store with exhaustive cosine scans.
///
/// Entries keep insertion order, so equal-distance hits come back in the
/// order they were stored.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cosine distance in `[0, 2]`; zero-norm vectors are maximally distant
/// from everything at distance 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn matches_filter(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, entries: Vec<(IndexedDocument, Vec<f32>)>) -> Result<(), ExtractError> {
        let mut stored = self.entries.lock();
        for (document, vector) in entries {
            match stored.iter_mut().find(|e| e.document.id == document.id) {
                Some(existing) => {
                    existing.document = document;
                    existing.vector = vector;
                }
                None => stored.push(Entry { document, vector }),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        n: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<QueryHit>, ExtractError> {
        let stored = self.entries.lock();
        let mut hits: Vec<QueryHit> = stored
            .iter()
            .filter(|entry| {
                filter
                    .map(|f| matches_filter(&entry.document.metadata, f))
                    .unwrap_or(true)
            })
            .map(|entry| QueryHit {
                id: entry.document.id.clone(),
                document: entry.document.text.clone(),
                metadata: entry.document.metadata.clone(),
                distance: cosine_distance(vector, &entry.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(n);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, ExtractError> {
        Ok(self.entries.lock().len())
    }
}
