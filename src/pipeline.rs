//! End-to-end extraction pipeline.
//!
//! Pages flow through four stages: preprocess and segment, convert math
//! notation to markup, validate, then embed and index. A failure anywhere
//! is scoped to the item it happened on. A page that fails to segment is
//! recorded and skipped; a conversion-service failure falls back to the
//! rule-based converter; a validation failure marks the question invalid
//! but still indexes it; an indexing failure is recorded and the run
//! continues with the next page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::index::EmbeddingIndex;
use crate::markup::validator::annotate_validation;
use crate::markup::{MarkupValidator, MathMarkupConverter, MathMode};
use crate::retriever::{HybridRetriever, RetrievedQuestion};
use crate::segmenter::{QuestionSegmenter, preprocess};
use crate::services::ConversionService;
use crate::types::{ExtractError, IndexedDocument, Metadata, Question, new_metadata};

/// One page of source text.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Page {
    pub page_number: u32,
    pub text: String,
}

/// Outcome of a pipeline run.
#[derive(Clone, Debug, Serialize)]
pub struct ExtractionReport {
    /// All extracted questions, markup attached and validation recorded.
    pub questions: Vec<Question>,
    pub total: usize,
    /// Number of documents stored in the index.
    pub indexed: usize,
    /// Non-fatal failures recorded along the way.
    pub errors: Vec<String>,
}

/// Extraction pipeline over a conversion service and an embedding index.
pub struct ExtractionPipeline {
    segmenter: QuestionSegmenter,
    converter: MathMarkupConverter,
    validator: MarkupValidator,
    conversion: Arc<dyn ConversionService>,
    index: EmbeddingIndex,
    retriever: HybridRetriever,
}

impl ExtractionPipeline {
    pub fn new(conversion: Arc<dyn ConversionService>, index: EmbeddingIndex) -> Self {
        Self {
            segmenter: QuestionSegmenter::new(),
            converter: MathMarkupConverter::new(),
            validator: MarkupValidator::default(),
            conversion,
            index: index.clone(),
            retriever: HybridRetriever::new(index),
        }
    }

    pub fn with_validator(mut self, validator: MarkupValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Run the full pipeline over a chapter's pages.
    pub async fn process(
        &self,
        pages: &[Page],
        chapter: u32,
        topic: &str,
    ) -> Result<ExtractionReport, ExtractError> {
        let mut report = ExtractionReport {
            questions: Vec::new(),
            total: 0,
            indexed: 0,
            errors: Vec::new(),
        };

        for page in pages {
            let cleaned = preprocess(&page.text);
            if cleaned.trim().is_empty() {
                continue;
            }

            let mut questions = match self.segmenter.segment_and_classify(&cleaned) {
                Ok(questions) => questions,
                Err(err) => {
                    warn!(page = page.page_number, error = %err, "page segmentation failed");
                    report
                        .errors
                        .push(format!("page {}: {err}", page.page_number));
                    continue;
                }
            };

            let mut documents = Vec::with_capacity(questions.len());
            for question in &mut questions {
                question.page_number = Some(page.page_number);

                let markup = self.convert_with_fallback(&question.text).await;
                question.markup = Some(markup.clone());

                let (valid, errors) = self.validator.validate_question(question);
                annotate_validation(&mut question.metadata, valid, &errors);
                if !valid {
                    debug!(
                        page = page.page_number,
                        errors = errors.len(),
                        "question failed validation, indexing anyway"
                    );
                }

                documents.push(self.to_document(question, &markup, chapter, topic, valid));
            }

            match self.index.add(documents).await {
                Ok(stored) => report.indexed += stored,
                Err(err) => {
                    warn!(page = page.page_number, error = %err, "indexing failed");
                    report
                        .errors
                        .push(format!("page {}: {err}", page.page_number));
                }
            }

            report.questions.extend(questions);
        }

        report.total = report.questions.len();
        info!(
            chapter,
            topic,
            total = report.total,
            indexed = report.indexed,
            errors = report.errors.len(),
            "extraction run finished"
        );
        Ok(report)
    }

    /// Segment and classify one page. No conversion, validation, or
    /// indexing; callers wanting the full chain use [`Self::process`].
    pub fn extract(&self, page_text: &str) -> Result<Vec<Question>, ExtractError> {
        let cleaned = preprocess(page_text);
        self.segmenter.segment_and_classify(&cleaned)
    }

    /// Retrieve indexed questions, optionally scoped to a chapter or topic.
    pub async fn search(
        &self,
        query: &str,
        chapter: Option<u32>,
        topic: Option<&str>,
        n: usize,
    ) -> Result<Vec<RetrievedQuestion>, ExtractError> {
        let mut filter = new_metadata();
        if let Some(chapter) = chapter {
            filter.insert("chapter".to_string(), serde_json::json!(chapter));
        }
        if let Some(topic) = topic {
            filter.insert("topic".to_string(), serde_json::json!(topic));
        }
        let filter = (!filter.is_empty()).then_some(&filter);
        self.retriever.retrieve(query, n, filter).await
    }

    /// Ask the conversion service, falling back to the rule-based converter
    /// when the service errors out or returns nothing.
    async fn convert_with_fallback(&self, text: &str) -> String {
        match self.conversion.convert_to_latex(text).await {
            Ok(markup) if !markup.trim().is_empty() => markup,
            Ok(_) => {
                debug!("conversion service returned empty markup, using rule-based converter");
                self.converter.convert(text, MathMode::Inline)
            }
            Err(err) => {
                warn!(error = %err, "conversion service failed, using rule-based converter");
                self.converter.convert(text, MathMode::Inline)
            }
        }
    }

    fn to_document(
        &self,
        question: &Question,
        markup: &str,
        chapter: u32,
        topic: &str,
        valid: bool,
    ) -> IndexedDocument {
        let id = match (&question.number, question.page_number) {
            (Some(number), Some(page)) => {
                format!("q-{chapter}-{}-p{page}-{number}", slug(topic))
            }
            _ => Uuid::new_v4().to_string(),
        };

        let mut metadata: Metadata = new_metadata();
        metadata.insert("chapter".to_string(), serde_json::json!(chapter));
        metadata.insert("topic".to_string(), serde_json::json!(topic));
        metadata.insert(
            "question_type".to_string(),
            serde_json::json!(question.kind.as_str()),
        );
        if let Some(page) = question.page_number {
            metadata.insert("page_number".to_string(), serde_json::json!(page));
        }
        if let Some(number) = &question.number {
            metadata.insert("question_number".to_string(), serde_json::json!(number));
        }
        metadata.insert(
            "confidence".to_string(),
            serde_json::json!(question.confidence),
        );
        metadata.insert("valid".to_string(), serde_json::json!(valid));

        let text = format!("{}\n\nLaTeX: {markup}", question.text);
        IndexedDocument::new(id, text).with_metadata(metadata)
    }
}

fn slug(topic: &str) -> String {
    topic
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
