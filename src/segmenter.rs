//! Block segmentation and question classification.
//!
//! Page text flows through two steps: [`preprocess`] normalizes notation and
//! strips scan artifacts, then [`QuestionSegmenter::segment_and_classify`]
//! splits the text into candidate blocks and turns the ones that look like
//! questions into [`Question`] records.
//!
//! Segmentation is pure text analysis. It never calls out to services and it
//! never raises for malformed *content*; blocks that fail every question
//! heuristic are dropped silently.

use regex::Regex;
use std::sync::LazyLock;

use crate::markup::symbols::MATH_SYMBOLS;
use crate::types::{ExtractError, Question, QuestionKind};

/// Priority-ordered block-start rule table, evaluated top-down with
/// first-match-wins semantics.
static BLOCK_START_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\d+\.",
        r"^Q\d+",
        r"^Example \d+",
        r"^Illustration \d+",
        r"^Exercise",
        r"^Problem",
        r"^\([a-z]\)",
        r"^[IVX]+\.",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("block-start pattern compiles"))
    .collect()
});

/// Number extraction patterns tried in order; the first match's captured
/// group wins.
static NUMBER_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(\d+)\.",
        r"^Q(\d+)",
        r"^Question (\d+)",
        r"^\(([a-z])\)",
        r"^([IVX]+)\.",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("number pattern compiles"))
    .collect()
});

static MATH_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d+[+\-*/]\d+",   // arithmetic expression
        r"[xy]=",           // equation
        r"\\[a-zA-Z]+",     // escaped command token
        r"\^",              // exponent caret
        r"_\{",             // subscript brace
        r"P\([^)]+\)",      // probability notation
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("math pattern compiles"))
    .collect()
});

static MULTI_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));
static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPage\s+\d+\b").expect("page pattern compiles"));
static HEADER_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)R\.?\s?D\.?\s+SHARMA.*?Class\s*\d+").expect("header pattern compiles")
});
static WATERMARK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:SAMPLE|WATERMARK|CONFIDENTIAL)\b").expect("watermark pattern compiles")
});
static EXCESS_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("break pattern compiles"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:!?])").expect("punct pattern compiles"));
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("space pattern compiles"));

/// Command verbs that mark a block as a question candidate. Case-insensitive
/// substring match.
const COMMAND_VERBS: &[&str] = &[
    "find",
    "calculate",
    "prove",
    "show that",
    "determine",
    "evaluate",
    "solve",
    "verify",
    "derive",
    "explain",
    "state",
    "define",
    "given",
    "if",
    "when",
    "what",
    "which",
    "how",
    "why",
];

/// Normalize page text before segmentation.
///
/// Standardizes unicode math symbols to their command equivalents, strips
/// page markers, header boilerplate, and watermark tokens, collapses space
/// runs and excessive line breaks, and tidies spacing around punctuation.
pub fn preprocess(text: &str) -> String {
    let mut out = text.to_string();

    for (symbol, command) in MATH_SYMBOLS {
        if out.contains(symbol) {
            out = out.replace(symbol, &format!(" {command} "));
        }
    }

    out = PAGE_MARKER.replace_all(&out, "").into_owned();
    out = HEADER_BOILERPLATE.replace_all(&out, "").into_owned();
    out = WATERMARK.replace_all(&out, "").into_owned();
    out = EXCESS_BREAKS.replace_all(&out, "\n\n").into_owned();
    out = SPACE_RUNS.replace_all(&out, " ").into_owned();
    out = SPACE_BEFORE_PUNCT.replace_all(&out, "$1").into_owned();

    out.trim().to_string()
}

/// Returns `true` if the text contains recognizable mathematical content:
/// an arithmetic or equation pattern, an escaped command, a caret, a
/// subscript brace, probability notation, or any symbol from the fixed
/// math symbol table.
pub fn contains_math(text: &str) -> bool {
    if MATH_RULES.iter().any(|rule| rule.is_match(text)) {
        return true;
    }
    MATH_SYMBOLS.iter().any(|(symbol, _)| text.contains(symbol))
}

/// Splits page text into question-candidate blocks and classifies each one.
#[derive(Clone, Debug, Default)]
pub struct QuestionSegmenter;

impl QuestionSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Segment `text` into classified [`Question`] records.
    ///
    /// Fails with [`ExtractError::InvalidInput`] only when the input is
    /// empty; text that yields no question candidates returns an empty
    /// vector.
    pub fn segment_and_classify(&self, text: &str) -> Result<Vec<Question>, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::InvalidInput(
                "segmentation input is empty".to_string(),
            ));
        }

        let blocks = split_into_blocks(text);
        let mut questions = Vec::new();

        for block in &blocks {
            if !self.is_question_block(block) {
                continue;
            }
            if let Some(question) = self.build_question(block) {
                questions.push(question);
            }
        }

        tracing::debug!(
            blocks = blocks.len(),
            questions = questions.len(),
            "segmented page text"
        );
        Ok(questions)
    }

    /// A block is kept when it shows at least one question indicator:
    /// an interrogative mark, a command verb, or math content.
    fn is_question_block(&self, block: &str) -> bool {
        if block.contains('?') {
            return true;
        }
        let lower = block.to_lowercase();
        if COMMAND_VERBS.iter().any(|verb| lower.contains(verb)) {
            return true;
        }
        contains_math(block)
    }

    fn build_question(&self, block: &str) -> Option<Question> {
        let cleaned = clean_block(block);
        if cleaned.is_empty() {
            // Nothing but boilerplate survived cleaning.
            return None;
        }

        let kind = classify(block);
        let number = extract_number(block);
        let confidence = confidence_score(block, number.is_some());

        Some(Question::new(cleaned, kind, confidence).with_number(number))
    }
}

fn split_into_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_block_start(line) && !current.is_empty() {
            flush_block(&mut blocks, &mut current);
        }
        current.push(line);
    }
    flush_block(&mut blocks, &mut current);

    blocks
}

fn flush_block(blocks: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    let block = current.join("\n");
    current.clear();
    if !block.trim().is_empty() {
        blocks.push(block);
    }
}

fn is_block_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    BLOCK_START_RULES.iter().any(|rule| rule.is_match(trimmed))
}

/// Collapse internal whitespace and drop page/header boilerplate from a
/// kept block.
fn clean_block(block: &str) -> String {
    let mut out = MULTI_WHITESPACE.replace_all(block, " ").into_owned();
    out = PAGE_MARKER.replace_all(&out, "").into_owned();
    out = HEADER_BOILERPLATE.replace_all(&out, "").into_owned();
    out.trim().to_string()
}

/// Classify by substring in fixed priority order; `practice` is the default
/// for blocks matching nothing.
fn classify(block: &str) -> QuestionKind {
    let lower = block.to_lowercase();
    if lower.contains("illustration") {
        QuestionKind::Illustration
    } else if lower.contains("example") {
        QuestionKind::Example
    } else if lower.contains("exercise") {
        QuestionKind::Exercise
    } else if lower.contains("objective") {
        QuestionKind::Objective
    } else {
        QuestionKind::Practice
    }
}

fn extract_number(block: &str) -> Option<String> {
    let trimmed = block.trim_start();
    for rule in NUMBER_RULES.iter() {
        if let Some(captures) = rule.captures(trimmed) {
            return captures.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

/// Additive confidence score: 0.5 base, +0.2 for an interrogative mark,
/// +0.1 for math content, +0.1 for an extracted number, +0.1 for a command
/// verb, capped at 1.0.
fn confidence_score(block: &str, has_number: bool) -> f32 {
    let mut score: f32 = 0.5;
    if block.contains('?') {
        score += 0.2;
    }
    if contains_math(block) {
        score += 0.1;
    }
    if has_number {
        score += 0.1;
    }
    let lower = block.to_lowercase();
    if COMMAND_VERBS.iter().any(|verb| lower.contains(verb)) {
        score += 0.1;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_rejected() {
        let segmenter = QuestionSegmenter::new();
        assert!(matches!(
            segmenter.segment_and_classify("   \n  "),
            Err(ExtractError::InvalidInput(_))
        ));
    }

    #[test]
    fn numbered_exercise_scenario() {
        let segmenter = QuestionSegmenter::new();
        let questions = segmenter
            .segment_and_classify("1. Find the value of x^2 + 1/2.")
            .unwrap();
        assert_eq!(questions.len(), 1);

        let q = &questions[0];
        assert_eq!(q.number.as_deref(), Some("1"));
        assert_eq!(q.kind, QuestionKind::Practice);
        // 0.5 base + 0.1 math + 0.1 number + 0.1 keyword ("find").
        assert!(q.confidence >= 0.8 - f32::EPSILON, "got {}", q.confidence);
    }

    #[test]
    fn text_without_block_starts_yields_at_most_one_question() {
        let segmenter = QuestionSegmenter::new();
        let questions = segmenter
            .segment_and_classify("Evaluate the integral of f over the region.")
            .unwrap();
        assert_eq!(questions.len(), 1);

        let none = segmenter
            .segment_and_classify("The weather was pleasant that day.")
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn blocks_split_on_lead_in_patterns() {
        let segmenter = QuestionSegmenter::new();
        let text = "1. Solve for x: x=2+3.\n2. Prove that the sum is even.\nQ3 What is P(A)?";
        let questions = segmenter.segment_and_classify(text).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].number.as_deref(), Some("1"));
        assert_eq!(questions[1].number.as_deref(), Some("2"));
        assert_eq!(questions[2].number.as_deref(), Some("3"));
    }

    #[test]
    fn classification_priority_order() {
        assert_eq!(classify("Illustration 3: an example"), QuestionKind::Illustration);
        assert_eq!(classify("Example 4 from the exercise"), QuestionKind::Example);
        assert_eq!(classify("Exercise 30.5"), QuestionKind::Exercise);
        assert_eq!(classify("Objective test"), QuestionKind::Objective);
        assert_eq!(classify("1. Solve it."), QuestionKind::Practice);
    }

    #[test]
    fn roman_and_letter_numbering() {
        assert_eq!(extract_number("(a) Find the slope."), Some("a".to_string()));
        assert_eq!(extract_number("IV. Derive the formula."), Some("IV".to_string()));
        assert_eq!(extract_number("Plain text with no number"), None);
    }

    #[test]
    fn confidence_stays_within_unit_interval() {
        let segmenter = QuestionSegmenter::new();
        let text = "1. What is P(A|B)? Find and prove x=1+2.";
        let questions = segmenter.segment_and_classify(text).unwrap();
        for q in questions {
            assert!((0.0..=1.0).contains(&q.confidence));
        }
    }

    #[test]
    fn boilerplate_only_block_is_dropped() {
        let segmenter = QuestionSegmenter::new();
        // "Problem" lead-in keeps the block-start rule engaged, but cleaning
        // leaves nothing behind: no question should be produced.
        let questions = segmenter
            .segment_and_classify("Page 12 what Page 13")
            .unwrap();
        // "what" survives cleaning, so the block stays; a fully boilerplate
        // block instead disappears.
        assert_eq!(questions.len(), 1);

        let none = clean_block("Page 12 Page 13");
        assert!(none.is_empty());
    }

    #[test]
    fn preprocess_standardizes_symbols_and_artifacts() {
        let text = "Page 3\nFind  ∫ f dx where α > 0 .\n\n\n\nSAMPLE";
        let cleaned = preprocess(text);
        assert!(cleaned.contains("\\int"));
        assert!(cleaned.contains("\\alpha"));
        assert!(!cleaned.contains("Page 3"));
        assert!(!cleaned.contains("SAMPLE"));
        assert!(!cleaned.contains("\n\n\n"));
        // Punctuation spacing is tidied.
        assert!(cleaned.ends_with('.') || !cleaned.contains(" ."));
    }

    #[test]
    fn math_detection_covers_spec_signals() {
        assert!(contains_math("2+2"));
        assert!(contains_math("x=5"));
        assert!(contains_math("\\frac{1}{2}"));
        assert!(contains_math("a^2"));
        assert!(contains_math("b_{1}"));
        assert!(contains_math("P(A|B)"));
        assert!(contains_math("∑ over i"));
        assert!(!contains_math("plain prose only"));
    }
}
