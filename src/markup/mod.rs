//! Math markup conversion and validation.
//!
//! [`converter`] rewrites plain-text math notation into LaTeX-style markup
//! through an ordered rule pipeline; [`validator`] checks structural
//! soundness of the result; [`symbols`] holds the shared vocabularies.

pub mod converter;
pub mod symbols;
pub mod validator;

pub use converter::{MathMarkupConverter, MathMode};
pub use validator::{BatchFailure, BatchReport, MarkupValidator, ValidationReport};
