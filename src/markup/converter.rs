//! Rule-based conversion of raw text fragments into math markup.
//!
//! This is the deterministic fallback path used when the external conversion
//! service is unavailable or returns an empty result. The rewrite pipeline is
//! strictly ordered; later steps assume the normalization performed by
//! earlier ones.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::markup::symbols::MATH_SYMBOLS;

/// Delimiter mode applied to converted output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MathMode {
    #[default]
    Inline,
    Display,
    Equation,
    Align,
}

impl MathMode {
    fn delimiters(&self) -> (&'static str, &'static str) {
        match self {
            MathMode::Inline => ("$", "$"),
            MathMode::Display => ("$$", "$$"),
            MathMode::Equation => (r"\begin{equation}", r"\end{equation}"),
            MathMode::Align => (r"\begin{align}", r"\end{align}"),
        }
    }
}

static PROTECTED_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+(?:\{[^}]*\})*").expect("command pattern compiles"));

static FRACTION_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("fraction pattern compiles"));
static FRACTION_PARENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([^)]+)\)\s*/\s*\(([^)]+)\)").expect("fraction pattern compiles")
});
static FRACTION_IDENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z]+)\s*/\s*([a-zA-Z]+)").expect("fraction pattern compiles")
});

static EXPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9])\^([a-zA-Z0-9]+)").expect("exponent compiles"));
static EXPONENT_SIGNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9])\^([+-]\d+)").expect("exponent compiles"));
static SUBSCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z])_([a-zA-Z0-9]+)").expect("subscript compiles"));
static SUBSCRIPT_SIGNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z])_([+-]\d+)").expect("subscript compiles"));

static ROOT_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"√\s*([a-zA-Z0-9]+)").expect("root pattern compiles"));
static ROOT_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sqrt\s*\(([^)]+)\)").expect("root pattern compiles"));
static ROOT_INDEXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:st|nd|rd|th)\s+root\s+of\s+([a-zA-Z0-9]+)").expect("root compiles")
});

static INTEGRAL_BOUNDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"integral\s+from\s+([a-zA-Z0-9]+)\s+to\s+([a-zA-Z0-9]+)").expect("int compiles")
});
static SUM_BOUNDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"sum\s+from\s+([a-zA-Z0-9]+)\s*=\s*([a-zA-Z0-9]+)\s+to\s+([a-zA-Z0-9]+)")
        .expect("sum compiles")
});

static MATRIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*([^\[\]]+?)\s*\]").expect("matrix pattern compiles"));

static PROB_CONDITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"P\s*\(\s*([^|()]+?)\s*\|\s*([^()]+?)\s*\)").expect("probability compiles")
});
static PROB_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"P\s+\(").expect("probability compiles"));
static EXPECTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"E\s*\[([^\]]+)\]").expect("expectation compiles"));
static VARIANCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Var\s*\(([^)]+)\)").expect("variance compiles"));
static COMBINATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"C\s*\(\s*([a-zA-Z0-9]+)\s*,\s*([a-zA-Z0-9]+)\s*\)").expect("binom compiles")
});

/// Deterministic, stateless text-to-markup rewriter.
#[derive(Clone, Debug, Default)]
pub struct MathMarkupConverter;

impl MathMarkupConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert `text` into math markup wrapped in `mode` delimiters.
    ///
    /// Pure function: calling it twice on its own output neither
    /// double-wraps delimiters nor corrupts already-escaped commands.
    pub fn convert(&self, text: &str, mode: MathMode) -> String {
        let (mut out, protected) = protect_markup(text);

        out = convert_fractions(&out);
        out = convert_exponents_subscripts(&out);
        out = convert_roots(&out);
        out = convert_integrals_sums(&out);
        out = convert_matrices(&out);
        out = convert_probability(&out);
        out = substitute_symbols(&out);
        out = apply_mode(&out, mode);

        let restored = restore_markup(&out, &protected);
        restored.replace("\n\n", "\n\\medskip\n")
    }
}

/// Pass 1 of the two-pass transform: extract already-correct markup spans
/// into a local list and replace them with placeholders that no rewrite
/// rule can touch (private-use-area sentinels around the span index).
fn protect_markup(text: &str) -> (String, Vec<String>) {
    let mut protected = Vec::new();
    let result = PROTECTED_COMMAND.replace_all(text, |caps: &Captures| {
        let idx = protected.len();
        protected.push(caps[0].to_string());
        format!("\u{E000}{idx}\u{E000}")
    });
    (result.into_owned(), protected)
}

/// Pass 2: consume the protected spans by position, restoring them verbatim.
fn restore_markup(text: &str, protected: &[String]) -> String {
    let mut out = text.to_string();
    for (idx, span) in protected.iter().enumerate() {
        out = out.replace(&format!("\u{E000}{idx}\u{E000}"), span);
    }
    out
}

/// Most specific pattern first so numeric and parenthesized fractions are
/// not consumed by the bare-identifier rule.
fn convert_fractions(text: &str) -> String {
    let out = FRACTION_NUMERIC.replace_all(text, r"\frac{${1}}{${2}}");
    let out = FRACTION_PARENS.replace_all(&out, r"\frac{${1}}{${2}}");
    FRACTION_IDENT
        .replace_all(&out, r"\frac{${1}}{${2}}")
        .into_owned()
}

fn convert_exponents_subscripts(text: &str) -> String {
    let out = EXPONENT.replace_all(text, r"${1}^{${2}}");
    let out = EXPONENT_SIGNED.replace_all(&out, r"${1}^{${2}}");
    let out = SUBSCRIPT.replace_all(&out, r"${1}_{${2}}");
    SUBSCRIPT_SIGNED
        .replace_all(&out, r"${1}_{${2}}")
        .into_owned()
}

fn convert_roots(text: &str) -> String {
    let out = ROOT_SYMBOL.replace_all(text, r"\sqrt{${1}}");
    let out = ROOT_WORD.replace_all(&out, r"\sqrt{${1}}");
    ROOT_INDEXED
        .replace_all(&out, r"\sqrt[${1}]{${2}}")
        .into_owned()
}

fn convert_integrals_sums(text: &str) -> String {
    let out = text.replace('∫', r"\int").replace('Σ', r"\sum");
    let out = out.replace('∑', r"\sum").replace('∏', r"\prod");
    let out = INTEGRAL_BOUNDS.replace_all(&out, r"\int_{${1}}^{${2}}");
    SUM_BOUNDS
        .replace_all(&out, r"\sum_{${1}=${2}}^{${3}}")
        .into_owned()
}

/// Bracketed content becomes a matrix environment only when it looks
/// row-delimited (`;` or embedded line breaks); plain bracket use is left
/// untouched.
fn convert_matrices(text: &str) -> String {
    MATRIX
        .replace_all(text, |caps: &Captures| {
            let content = &caps[1];
            if content.contains(';') || content.contains('\n') {
                let rows: Vec<&str> = if content.contains(';') {
                    content.split(';').map(str::trim).collect()
                } else {
                    content.split('\n').map(str::trim).collect()
                };
                format!(r"\begin{{bmatrix}} {} \end{{bmatrix}}", rows.join(r" \\ "))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn convert_probability(text: &str) -> String {
    let out = PROB_CONDITIONAL.replace_all(text, r"P(${1} \mid ${2})");
    let out = PROB_PLAIN.replace_all(&out, "P(");
    let out = EXPECTATION.replace_all(&out, r"\mathbb{E}[${1}]");
    let out = VARIANCE.replace_all(&out, r"\text{Var}(${1})");
    let out = COMBINATION.replace_all(&out, r"\binom{${1}}{${2}}");
    let out = out.replace("nCr", r"\binom{n}{r}");
    out.replace("nPr", "P_n^r")
}

fn substitute_symbols(text: &str) -> String {
    let mut out = text.to_string();
    for (symbol, command) in MATH_SYMBOLS {
        if out.contains(symbol) {
            out = out.replace(symbol, command);
        }
    }
    out
}

fn apply_mode(text: &str, mode: MathMode) -> String {
    let (open, close) = mode.delimiters();
    if text.starts_with(open) {
        text.to_string()
    } else {
        format!("{open}{text}{close}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(text: &str) -> String {
        MathMarkupConverter::new().convert(text, MathMode::Inline)
    }

    #[test]
    fn simple_fraction_scenario() {
        assert_eq!(convert("1/2"), r"$\frac{1}{2}$");
    }

    #[test]
    fn fraction_priority_order() {
        assert_eq!(convert("(a+b)/(c+d)"), r"$\frac{a+b}{c+d}$");
        assert_eq!(convert("x/y"), r"$\frac{x}{y}$");
    }

    #[test]
    fn exponents_and_subscripts_get_braced() {
        assert_eq!(convert("x^2"), r"$x^{2}$");
        assert_eq!(convert("x^-2"), r"$x^{-2}$");
        assert_eq!(convert("a_n"), r"$a_{n}$");
    }

    #[test]
    fn roots_in_all_three_notations() {
        assert_eq!(convert("√x"), r"$\sqrt{x}$");
        assert_eq!(convert("sqrt(a+b)"), r"$\sqrt{a+b}$");
        assert_eq!(convert("3rd root of 8"), r"$\sqrt[3]{8}$");
    }

    #[test]
    fn bounded_integral_and_sum_phrases() {
        assert_eq!(convert("integral from 0 to 1"), r"$\int_{0}^{1}$");
        assert_eq!(convert("sum from i=1 to n"), r"$\sum_{i=1}^{n}$");
    }

    #[test]
    fn matrix_heuristic_requires_row_delimiter() {
        assert_eq!(
            convert("[1 2; 3 4]"),
            r"$\begin{bmatrix} 1 2 \\ 3 4 \end{bmatrix}$"
        );
        // Plain bracket use is not a matrix.
        assert_eq!(convert("[closed interval]"), "$[closed interval]$");
    }

    #[test]
    fn probability_notation_family() {
        assert_eq!(convert("P(A|B)"), r"$P(A \mid B)$");
        assert_eq!(convert("E[X]"), r"$\mathbb{E}[X]$");
        assert_eq!(convert("Var(X)"), r"$\text{Var}(X)$");
        assert_eq!(convert("C(n,r)"), r"$\binom{n}{r}$");
        assert_eq!(convert("nCr"), r"$\binom{n}{r}$");
        assert_eq!(convert("nPr"), "$P_n^r$");
    }

    #[test]
    fn greek_and_set_symbols_substitute() {
        assert_eq!(convert("α ∈ A"), r"$\alpha \in A$");
        assert_eq!(convert("x ≤ y"), r"$x \leq y$");
    }

    #[test]
    fn display_and_environment_modes() {
        let converter = MathMarkupConverter::new();
        assert_eq!(converter.convert("1/2", MathMode::Display), r"$$\frac{1}{2}$$");
        assert_eq!(
            converter.convert("1/2", MathMode::Equation),
            r"\begin{equation}\frac{1}{2}\end{equation}"
        );
    }

    #[test]
    fn conversion_is_idempotent_on_its_own_output() {
        let converter = MathMarkupConverter::new();
        for input in ["1/2", "x^2 + y_1", "P(A|B)", "sqrt(x)", "α + β"] {
            let once = converter.convert(input, MathMode::Inline);
            let twice = converter.convert(&once, MathMode::Inline);
            assert_eq!(once, twice, "double conversion changed {input:?}");
        }
    }

    #[test]
    fn existing_markup_survives_untouched() {
        let converted = convert(r"\frac{1}{2} plus x/y");
        assert_eq!(converted, r"$\frac{1}{2} plus \frac{x}{y}$");
    }

    #[test]
    fn double_blank_lines_collapse_to_spacing_command() {
        let converted = convert("a = b\n\nc = d");
        assert!(converted.contains(r"\medskip"));
        assert!(!converted.contains("\n\n"));
    }
}
