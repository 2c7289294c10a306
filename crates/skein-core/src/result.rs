//! Results: per-step records, the await request, and the skill outcome.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::FieldSpec;
use crate::step::{AwaitStepConfig, StepStatus};

/// Immutable record of one step's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Name of the step.
    pub step_name: String,

    /// Terminal status of the step.
    pub status: StepStatus,

    /// Output value, when the step produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Error message, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock duration of the step in milliseconds.
    pub duration_ms: u64,
}

impl StepResult {
    /// Creates a successful step result.
    pub fn success(step_name: impl Into<String>, output: Option<Value>, duration_ms: u64) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Success,
            output,
            error: None,
            duration_ms,
        }
    }

    /// Creates a failed step result.
    pub fn failure(
        step_name: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Failed,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// Creates a skipped step result.
    pub fn skipped(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Skipped,
            output: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Creates an awaiting step result carrying the input request.
    pub fn awaiting(step_name: impl Into<String>, request: &AwaitRequest, duration_ms: u64) -> Self {
        Self {
            step_name: step_name.into(),
            status: StepStatus::Awaiting,
            output: serde_json::to_value(request).ok(),
            error: None,
            duration_ms,
        }
    }

    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// The input request surfaced to the caller when an execution pauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitRequest {
    /// Message to present.
    pub message: String,

    /// Schema of the expected input.
    pub input_schema: Vec<FieldSpec>,
}

impl From<&AwaitStepConfig> for AwaitRequest {
    fn from(config: &AwaitStepConfig) -> Self {
        Self {
            message: config.message.clone(),
            input_schema: config.input_schema.clone(),
        }
    }
}

/// Terminal status of one execute/resume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillStatus {
    /// The skill ran to the end and its output passed the contract.
    Completed,
    /// A step failed or the output violated the contract.
    Failed,
    /// An AWAIT step suspended the execution.
    WaitingForInput,
}

/// Outcome of one execute/resume call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    /// Three-valued outcome.
    pub status: SkillStatus,

    /// Convenience flag: `status == Completed`.
    pub success: bool,

    /// The execution id; stable across pause and resume.
    pub execution_id: String,

    /// Final output mapping, on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Failure message, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The pending input request, when waiting for input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub await_request: Option<AwaitRequest>,

    /// Per-step records, in execution order.
    pub step_results: Vec<StepResult>,

    /// Wall-clock duration of this call in milliseconds.
    pub duration_ms: u64,
}

impl SkillResult {
    /// Creates a completed result.
    pub fn success(
        execution_id: impl Into<String>,
        output: Value,
        step_results: Vec<StepResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: SkillStatus::Completed,
            success: true,
            execution_id: execution_id.into(),
            output: Some(output),
            error: None,
            await_request: None,
            step_results,
            duration_ms,
        }
    }

    /// Creates a failed result.
    pub fn failure(
        execution_id: impl Into<String>,
        error: impl Into<String>,
        step_results: Vec<StepResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: SkillStatus::Failed,
            success: false,
            execution_id: execution_id.into(),
            output: None,
            error: Some(error.into()),
            await_request: None,
            step_results,
            duration_ms,
        }
    }

    /// Creates a waiting-for-input result.
    pub fn awaiting(
        execution_id: impl Into<String>,
        request: AwaitRequest,
        step_results: Vec<StepResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            status: SkillStatus::WaitingForInput,
            success: false,
            execution_id: execution_id.into(),
            output: None,
            error: None,
            await_request: Some(request),
            step_results,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_result_constructors() {
        let ok = StepResult::success("s", Some(json!(1)), 10);
        assert!(ok.is_success());
        assert_eq!(ok.output, Some(json!(1)));

        let failed = StepResult::failure("s", "boom", 5);
        assert_eq!(failed.status, StepStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));

        let skipped = StepResult::skipped("s");
        assert_eq!(skipped.status, StepStatus::Skipped);
        assert_eq!(skipped.duration_ms, 0);
    }

    #[test]
    fn awaiting_result_embeds_the_request() {
        let request = AwaitRequest {
            message: "ok?".to_string(),
            input_schema: vec![FieldSpec::new("approved", crate::FieldType::Boolean)],
        };
        let result = StepResult::awaiting("confirm", &request, 1);
        assert_eq!(result.status, StepStatus::Awaiting);
        let embedded = result.output.unwrap();
        assert_eq!(embedded["message"], json!("ok?"));
    }

    #[test]
    fn skill_result_status_flags() {
        let ok = SkillResult::success("e-1", json!({}), vec![], 3);
        assert!(ok.success);
        assert_eq!(ok.status, SkillStatus::Completed);

        let failed = SkillResult::failure("e-1", "step 'x' failed", vec![], 3);
        assert!(!failed.success);
        assert_eq!(failed.status, SkillStatus::Failed);

        let waiting = SkillResult::awaiting(
            "e-1",
            AwaitRequest {
                message: "go on?".to_string(),
                input_schema: vec![],
            },
            vec![],
            3,
        );
        assert_eq!(waiting.status, SkillStatus::WaitingForInput);
        assert!(waiting.await_request.is_some());
    }

    #[test]
    fn statuses_serialize_screaming() {
        assert_eq!(
            serde_json::to_value(SkillStatus::WaitingForInput).unwrap(),
            json!("WAITING_FOR_INPUT")
        );
        assert_eq!(
            serde_json::to_value(StepStatus::Skipped).unwrap(),
            json!("SKIPPED")
        );
    }
}
