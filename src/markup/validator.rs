//! Structural validation of math markup and extracted questions.
//!
//! Every check runs independently and all failing reasons accumulate;
//! validation never raises. Missing fields degrade to reported errors.

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::LazyLock;

use crate::markup::symbols::is_allowed_command;
use crate::types::Question;

pub const MSG_UNBALANCED_BRACES: &str = "unbalanced braces";
pub const MSG_UNBALANCED_DOLLARS: &str = "unbalanced math delimiters";
pub const MSG_MISSING_BRACES: &str = "missing braces after command";
pub const MSG_FRACTION_BRACES: &str = "fraction command missing braces";
pub const MSG_DOUBLED_SCRIPTS: &str = "doubled subscript or superscript markers";

static COMMAND_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([a-zA-Z]+)").expect("command token compiles"));
static ENV_BEGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\{([^}]+)\}").expect("begin pattern compiles"));
static MISSING_BRACES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:frac|sqrt|sum|int)\s+[^{\s]").expect("missing-braces pattern compiles")
});
static BARE_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\frac(?:[^{]|$)").expect("bare-fraction pattern compiles"));
static DOUBLED_SCRIPTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__|\^\^|_\{[^}]*\}_[^{]*|\^\{[^}]*\}\^").expect("doubled-script compiles")
});

/// Words accepted as a question indicator alongside an interrogative mark.
const QUESTION_INDICATORS: &[&str] = &[
    "find",
    "calculate",
    "prove",
    "show",
    "determine",
    "evaluate",
    "solve",
    "verify",
];

/// Result of validating one markup string.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Per-question entry in a [`BatchReport`].
#[derive(Clone, Debug, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    pub errors: Vec<String>,
}

/// Aggregate validation report over a batch of questions.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub failures: Vec<BatchFailure>,
    pub warnings: Vec<String>,
}

/// Structural markup and question validator.
#[derive(Clone, Debug)]
pub struct MarkupValidator {
    min_question_len: usize,
}

impl Default for MarkupValidator {
    fn default() -> Self {
        Self {
            min_question_len: 10,
        }
    }
}

impl MarkupValidator {
    pub fn new(min_question_len: usize) -> Self {
        Self { min_question_len }
    }

    /// Validate a markup string. All checks run; all failures accumulate.
    pub fn validate(&self, markup: &str) -> ValidationReport {
        let mut errors = Vec::new();

        if !braces_balanced(markup) {
            errors.push(MSG_UNBALANCED_BRACES.to_string());
        }
        errors.extend(delimiter_errors(markup));
        errors.extend(structural_smells(markup));
        if let Some(message) = invalid_command_message(markup) {
            errors.push(message);
        }

        ValidationReport::from_errors(errors)
    }

    /// Validate a full question record: non-empty text, minimum length,
    /// presence of a question indicator, plus markup errors when markup is
    /// present.
    pub fn validate_question(&self, question: &Question) -> (bool, Vec<String>) {
        let mut errors = Vec::new();

        if question.text.is_empty() {
            errors.push("question text is missing".to_string());
        } else if question.text.chars().count() < self.min_question_len {
            errors.push("question text is too short".to_string());
        }

        if !has_question_indicator(&question.text) {
            errors.push("text doesn't appear to be a question".to_string());
        }

        if let Some(markup) = &question.markup {
            errors.extend(self.validate(markup).errors);
        }

        (errors.is_empty(), errors)
    }

    /// Validate a batch, reporting per-item errors and a warning when the
    /// invalid fraction exceeds 20%.
    pub fn validate_batch(&self, questions: &[Question]) -> BatchReport {
        let mut report = BatchReport {
            total: questions.len(),
            valid: 0,
            invalid: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
        };

        for (index, question) in questions.iter().enumerate() {
            let (ok, errors) = self.validate_question(question);
            if ok {
                report.valid += 1;
            } else {
                report.invalid += 1;
                report.failures.push(BatchFailure { index, errors });
            }
        }

        if report.invalid as f64 > report.total as f64 * 0.2 {
            report
                .warnings
                .push("more than 20% of questions failed validation".to_string());
        }

        report
    }
}

/// Running-counter brace check: fails if the counter ever goes negative or
/// ends nonzero.
fn braces_balanced(markup: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in markup.chars() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

fn delimiter_errors(markup: &str) -> Vec<String> {
    let mut errors = Vec::new();

    let dollars = markup.matches('$').count() - markup.matches(r"\$").count();
    if dollars % 2 != 0 {
        errors.push(MSG_UNBALANCED_DOLLARS.to_string());
    }

    if markup.matches(r"\[").count() != markup.matches(r"\]").count() {
        errors.push(r"unbalanced \[ \] delimiters".to_string());
    }
    if markup.matches(r"\(").count() != markup.matches(r"\)").count() {
        errors.push(r"unbalanced \( \) delimiters".to_string());
    }

    let mut seen = Vec::new();
    for caps in ENV_BEGIN.captures_iter(markup) {
        let name = caps[1].to_string();
        if seen.contains(&name) {
            continue;
        }
        let begins = markup.matches(&format!(r"\begin{{{name}}}")).count();
        let ends = markup.matches(&format!(r"\end{{{name}}}")).count();
        if begins != ends {
            errors.push(format!("unbalanced environment '{name}'"));
        }
        seen.push(name);
    }

    errors
}

fn structural_smells(markup: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if MISSING_BRACES.is_match(markup) {
        errors.push(MSG_MISSING_BRACES.to_string());
    }
    if BARE_FRACTION.is_match(markup) {
        errors.push(MSG_FRACTION_BRACES.to_string());
    }
    if DOUBLED_SCRIPTS.is_match(markup) {
        errors.push(MSG_DOUBLED_SCRIPTS.to_string());
    }
    errors
}

/// Checks every escaped command token against the allow-list, batching all
/// offenders into a single message.
fn invalid_command_message(markup: &str) -> Option<String> {
    let mut invalid: Vec<&str> = Vec::new();
    for caps in COMMAND_TOKEN.captures_iter(markup) {
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if !is_allowed_command(name) && !invalid.contains(&name) {
            invalid.push(name);
        }
    }
    if invalid.is_empty() {
        None
    } else {
        Some(format!("invalid commands: {}", invalid.join(", ")))
    }
}

fn has_question_indicator(text: &str) -> bool {
    if text.contains('?') {
        return true;
    }
    let lower = text.to_lowercase();
    QUESTION_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

/// Annotate a question's metadata with its validation outcome.
pub fn annotate_validation(metadata: &mut FxHashMap<String, serde_json::Value>, valid: bool, errors: &[String]) {
    metadata.insert("valid".to_string(), serde_json::json!(valid));
    if !errors.is_empty() {
        metadata.insert("validation_errors".to_string(), serde_json::json!(errors));
    }
}
