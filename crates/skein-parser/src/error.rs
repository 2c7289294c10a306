//! Parse errors with source locations.

use thiserror::Error;

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// A parse failure, located at a 1-based line (and column, when one is
/// known) of the skill document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "parse error at line {line}{}: {message}",
    .column.map(|c| format!(", column {c}")).unwrap_or_default()
)]
pub struct ParseError {
    /// 1-based line of the earliest problem.
    pub line: usize,
    /// 1-based column, when available.
    pub column: Option<usize>,
    /// Human-readable explanation.
    pub message: String,
}

impl ParseError {
    /// Creates an error at a line.
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    /// Attaches a column.
    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_column() {
        let err = ParseError::new(3, "unexpected section");
        assert_eq!(err.to_string(), "parse error at line 3: unexpected section");

        let err = err.with_column(7);
        assert_eq!(
            err.to_string(),
            "parse error at line 3, column 7: unexpected section"
        );
    }
}
