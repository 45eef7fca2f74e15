//! Fixed symbol and command vocabularies shared by the converter and the
//! validator.

/// Unicode math symbols mapped to their command equivalents.
///
/// Order matters only for readability; every replacement is a plain
/// substring substitution.
pub const MATH_SYMBOLS: &[(&str, &str)] = &[
    ("α", r"\alpha"),
    ("β", r"\beta"),
    ("γ", r"\gamma"),
    ("δ", r"\delta"),
    ("θ", r"\theta"),
    ("λ", r"\lambda"),
    ("μ", r"\mu"),
    ("σ", r"\sigma"),
    ("φ", r"\phi"),
    ("ω", r"\omega"),
    ("Σ", r"\sum"),
    ("∑", r"\sum"),
    ("∫", r"\int"),
    ("∏", r"\prod"),
    ("∞", r"\infty"),
    ("√", r"\sqrt"),
    ("≤", r"\leq"),
    ("≥", r"\geq"),
    ("≠", r"\neq"),
    ("≈", r"\approx"),
    ("∈", r"\in"),
    ("∉", r"\notin"),
    ("⊂", r"\subset"),
    ("⊃", r"\supset"),
    ("∪", r"\cup"),
    ("∩", r"\cap"),
    ("∀", r"\forall"),
    ("∃", r"\exists"),
];

/// Allow-list of command tokens accepted by the validator.
///
/// Covers trigonometric, calculus, Greek-letter, set/logic, formatting,
/// environment-delimiter, and combinatorial commands, plus everything the
/// rule-based converter can emit.
pub const ALLOWED_COMMANDS: &[&str] = &[
    // Calculus and arithmetic structure
    "frac", "sqrt", "sum", "int", "prod", "lim",
    // Trigonometric / transcendental
    "sin", "cos", "tan", "log", "ln", "exp",
    // Greek letters
    "alpha", "beta", "gamma", "delta", "theta", "lambda", "mu", "sigma", "phi", "omega",
    // Misc math
    "infty", "partial", "nabla", "times", "cdot",
    // Relations
    "leq", "geq", "neq", "approx", "equiv",
    // Set / logic
    "subset", "supset", "subseteq", "supseteq", "in", "notin", "cup", "cap", "emptyset",
    "forall", "exists", "mid",
    // Arrows
    "rightarrow", "leftarrow", "Rightarrow", "Leftarrow",
    // Formatting
    "text", "textbf", "textit", "mathbf", "mathit", "mathbb", "medskip",
    // Environment delimiters and sizing
    "begin", "end", "left", "right", "big", "Big",
    // Combinatorics
    "binom", "choose", "pmatrix", "bmatrix", "vmatrix",
];

/// Returns `true` if `command` (without the leading backslash) is in the
/// allow-list.
pub fn is_allowed_command(command: &str) -> bool {
    ALLOWED_COMMANDS.contains(&command)
}
