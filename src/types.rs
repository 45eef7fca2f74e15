//! Core domain types shared across the extraction pipeline.
//!
//! The central entity is [`Question`]: produced by the segmenter, enriched
//! with markup by the pipeline, annotated by the validator, and finally
//! projected into an [`IndexedDocument`] for vector storage.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Open metadata mapping carried through every stage.
///
/// Values are JSON scalars (strings, numbers, booleans) plus the occasional
/// array of validation messages.
pub type Metadata = FxHashMap<String, serde_json::Value>;

/// Convenience constructor for an empty metadata map.
pub fn new_metadata() -> Metadata {
    FxHashMap::default()
}

/// Classification assigned to every question exactly once during
/// segmentation. Unclassifiable blocks default to [`QuestionKind::Practice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Illustration,
    Exercise,
    Example,
    Practice,
    Objective,
    Subjective,
}

impl QuestionKind {
    /// Stable string form used in indexed metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::Illustration => "illustration",
            QuestionKind::Exercise => "exercise",
            QuestionKind::Example => "example",
            QuestionKind::Practice => "practice",
            QuestionKind::Objective => "objective",
            QuestionKind::Subjective => "subjective",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single extracted question.
///
/// Lifecycle: created by the segmenter (`text`, `kind`, `number`,
/// `confidence`), page-stamped by the caller supplying page-scoped text,
/// enriched with `markup` by the conversion stage, and annotated with
/// validation results in `metadata`. A question is never discarded on
/// validation failure; the failure is recorded and the record proceeds to
/// indexing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    /// Cleaned original fragment; non-empty after segmentation.
    pub text: String,
    /// Assigned exactly once; immutable after classification.
    pub kind: QuestionKind,
    /// Optional identifier such as `"12"`, `"a"`, or `"iii"`.
    pub number: Option<String>,
    /// Positive page number, set by the caller supplying page-scoped text.
    pub page_number: Option<u32>,
    /// Extraction confidence in `[0, 1]`, built additively from independent
    /// signals at segmentation time and never recomputed.
    pub confidence: f32,
    /// Math markup; absent until the conversion stage runs.
    pub markup: Option<String>,
    /// Chapter/topic/validation annotations accumulated across stages.
    #[serde(default = "new_metadata")]
    pub metadata: Metadata,
}

impl Question {
    pub fn new(text: impl Into<String>, kind: QuestionKind, confidence: f32) -> Self {
        Self {
            text: text.into(),
            kind,
            number: None,
            page_number: None,
            confidence,
            markup: None,
            metadata: new_metadata(),
        }
    }

    #[must_use]
    pub fn with_number(mut self, number: Option<String>) -> Self {
        self.number = number;
        self
    }
}

/// The persisted unit in the vector store: text plus markup, keyed by a
/// stable identifier, with an open metadata mapping.
///
/// Append-only from the caller's perspective; re-adding the same id is a safe
/// overwrite, never a duplicate entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: new_metadata(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// One result row from a vector query, before hybrid re-ranking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Cosine distance reported by the store; smaller is closer.
    pub distance: f32,
}

/// Crate-level error taxonomy.
///
/// Segmentation and validation never raise for malformed *content*; those
/// stages encode failure in their results. These variants cover genuinely
/// exceptional conditions: unusable input, exhausted external services, and
/// storage faults.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Malformed or empty input handed to segmentation or conversion.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external markup conversion capability exhausted its retries.
    #[error("conversion service error: {0}")]
    ConversionService(String),

    /// The embedding capability exhausted its retries. Only raised for
    /// single-item calls; batch callers degrade to zero vectors instead.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// Vector store failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_kind_serializes_lowercase() {
        let json = serde_json::to_string(&QuestionKind::Illustration).unwrap();
        assert_eq!(json, "\"illustration\"");
        let back: QuestionKind = serde_json::from_str("\"practice\"").unwrap();
        assert_eq!(back, QuestionKind::Practice);
    }

    #[test]
    fn question_round_trips_through_json() {
        let mut q = Question::new("Find x.", QuestionKind::Exercise, 0.7)
            .with_number(Some("3".to_string()));
        q.metadata
            .insert("chapter".to_string(), serde_json::json!(30));

        let json = serde_json::to_string(&q).unwrap();
        let back: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text, "Find x.");
        assert_eq!(back.kind, QuestionKind::Exercise);
        assert_eq!(back.number.as_deref(), Some("3"));
        assert_eq!(back.metadata["chapter"], serde_json::json!(30));
    }
}
