//! Error types for template and condition evaluation.

use thiserror::Error;

/// Result type alias using the [`ExprError`](enum@ExprError) enum.
pub type Result<T> = std::result::Result<T, ExprError>;

/// Errors that can occur when parsing or evaluating expressions.
///
/// Only structural problems are errors. A missing variable is not an error:
/// it renders empty in string context and resolves to `null` in value
/// context.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    /// A `{{` placeholder was opened but never closed.
    #[error("unterminated '{{{{' at offset {0}")]
    UnterminatedPlaceholder(usize),

    /// A `{{#for}}` block was opened but never closed.
    #[error("'{{{{#for {0}}}}}' block is never closed")]
    UnclosedLoop(String),

    /// A `{{/for}}` appeared without a matching `{{#for}}`.
    #[error("'{{{{/for}}}}' without a matching '{{{{#for}}}}'")]
    UnexpectedLoopClose,

    /// A condition expression could not be parsed.
    #[error("invalid condition '{text}': {reason}")]
    InvalidCondition {
        /// The original expression text.
        text: String,
        /// Why parsing failed.
        reason: String,
    },
}
