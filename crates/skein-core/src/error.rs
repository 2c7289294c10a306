//! Error types for skein-core.

use thiserror::Error;

/// Result type alias using the [`Error`](enum@Error) enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in skein-core and in the capabilities it defines.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A field has an invalid type.
    #[error("invalid type for field '{name}': expected {expected}, got {actual}")]
    InvalidFieldType {
        /// Field name.
        name: String,
        /// Expected type.
        expected: String,
        /// Actual type received.
        actual: String,
    },

    /// A field value failed a declared validation rule.
    #[error("field '{name}' failed validation: {message}")]
    FieldValidation {
        /// Field name.
        name: String,
        /// Rule message.
        message: String,
    },

    /// Tool not found in the registry.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed.
    #[error("tool execution failed: {0}")]
    ToolFailed(String),

    /// No usable language-model adapter.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// A language-model invocation failed.
    #[error("adapter invocation failed: {0}")]
    AdapterFailed(String),

    /// Skill not found in the repository.
    #[error("skill not found: {0}")]
    SkillNotFound(String),

    /// A skill descriptor violates a model invariant.
    #[error("invalid skill: {0}")]
    InvalidSkill(String),

    /// Execution store failure.
    #[error("execution store error: {0}")]
    Store(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error from a filesystem-backed capability.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_missing_field() {
        let err = Error::MissingField("approved".to_string());
        assert_eq!(err.to_string(), "missing required field: approved");
    }

    #[test]
    fn error_display_invalid_type() {
        let err = Error::InvalidFieldType {
            name: "count".to_string(),
            expected: "number".to_string(),
            actual: "string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid type for field 'count': expected number, got string"
        );
    }

    #[test]
    fn error_from_serde_json() {
        let json_err: serde_json::Error = serde_json::from_str::<String>("nope").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
