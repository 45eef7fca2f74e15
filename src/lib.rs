//! ```text
//! Page text ──► segmenter::preprocess ──► segmenter::QuestionSegmenter
//!                                              │
//!                                              ▼ Vec<Question>
//! services::ConversionService ──┬─► markup::MathMarkupConverter (fallback)
//!                               └─► markup::MarkupValidator
//!                                              │
//!                                              ▼ annotated questions
//! index::EmbeddingIndex ──► index::InMemoryStore / index::SqliteQuestionStore
//!                                              │
//!                                              ▼
//! retriever::HybridRetriever ──► ranked RetrievedQuestion hits
//! ```
//!
//! [`pipeline::ExtractionPipeline`] wires the stages together; each stage is
//! usable on its own.

pub mod config;
pub mod index;
pub mod markup;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod segmenter;
pub mod services;
pub mod types;

pub use config::QuestsmithConfig;
pub use index::{
    EmbeddingIndex, EmbeddingProvider, EmbeddingTask, GeminiEmbeddings, InMemoryStore,
    MockEmbeddingProvider, SqliteQuestionStore, VectorStore,
};
pub use markup::{MarkupValidator, MathMarkupConverter, MathMode, ValidationReport};
pub use pipeline::{ExtractionPipeline, ExtractionReport, Page};
pub use retriever::{HybridRetriever, RetrievedQuestion};
pub use retry::RetryPolicy;
pub use segmenter::QuestionSegmenter;
pub use services::{ConversionService, GeminiConverter};
pub use types::{ExtractError, IndexedDocument, Metadata, Question, QuestionKind, QueryHit};
