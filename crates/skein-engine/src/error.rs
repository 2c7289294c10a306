//! Engine error types.

use thiserror::Error;

/// Errors surfaced by [`SkillEngine`](crate::SkillEngine) operations.
///
/// Per-step failures are not errors — they come back inside a failed
/// [`SkillResult`](skein_core::SkillResult). These variants cover resume
/// misuse (which a transport maps to 404/409/400) and structural problems.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No snapshot exists for the execution id.
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    /// The snapshot exists but is not ACTIVE (already resumed, expired or
    /// cancelled).
    #[error("execution already completed: {0}")]
    ExecutionAlreadyCompleted(String),

    /// The resume input violates the await step's schema.
    #[error("invalid await input: {}", messages.join("; "))]
    InputValidation {
        /// One message per violated field.
        messages: Vec<String>,
    },

    /// The skill descriptor violates a model invariant.
    #[error("invalid skill: {0}")]
    InvalidSkill(String),

    /// Structural misuse or an infrastructure failure.
    #[error("engine error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_validation_joins_messages() {
        let err = EngineError::InputValidation {
            messages: vec![
                "field 'approved' is required".to_string(),
                "field 'count' must be number".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid await input: field 'approved' is required; field 'count' must be number"
        );
    }
}
