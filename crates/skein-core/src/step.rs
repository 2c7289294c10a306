//! Steps: the ordered nodes of a skill.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_expr::Condition;

use crate::field::FieldSpec;

/// The kind of a step, derived from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Invokes a registered tool.
    Tool,
    /// Calls the language-model adapter with a rendered prompt.
    Prompt,
    /// Suspends the execution and asks the caller for input.
    Await,
    /// Renders a template into the step output.
    Template,
}

impl StepKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Await => "await",
            Self::Template => "template",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime status of a step within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Not reached yet.
    Pending,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Success,
    /// Failed; the execution stops.
    Failed,
    /// Skipped by its `when` guard (or by an earlier failure).
    Skipped,
    /// Suspended the execution, waiting for caller input.
    Awaiting,
}

impl StepStatus {
    /// Whether this status ends the step's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Skipped | Self::Awaiting
        )
    }
}

/// Configuration for a TOOL step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStepConfig {
    /// Name of the tool to invoke.
    pub tool_name: String,

    /// Input mapping; string leaves may contain `{{…}}` sites and are
    /// rendered before the call.
    pub input_template: Value,

    /// Output field names the author declared. Advisory: used by static
    /// analysis, not enforced at runtime.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_fields: Vec<String>,
}

/// Configuration for a PROMPT step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStepConfig {
    /// The prompt template.
    pub template: String,
}

/// Configuration for a TEMPLATE step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateStepConfig {
    /// The text template.
    pub template: String,
}

/// Configuration for an AWAIT step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitStepConfig {
    /// Message shown to the caller when the execution pauses.
    pub message: String,

    /// Schema of the input the caller must supply to resume.
    pub input_schema: Vec<FieldSpec>,
}

/// Kind-specific step configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepConfig {
    /// TOOL step configuration.
    Tool(ToolStepConfig),
    /// PROMPT step configuration.
    Prompt(PromptStepConfig),
    /// AWAIT step configuration.
    Await(AwaitStepConfig),
    /// TEMPLATE step configuration.
    Template(TemplateStepConfig),
}

impl StepConfig {
    /// The kind this configuration belongs to.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Tool(_) => StepKind::Tool,
            Self::Prompt(_) => StepKind::Prompt,
            Self::Await(_) => StepKind::Await,
            Self::Template(_) => StepKind::Template,
        }
    }
}

/// One node in the ordered sequence of a skill.
///
/// Steps are immutable once parsed; runtime status lives in
/// [`StepResult`](crate::StepResult) records so parsed skills can be shared
/// across concurrent executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the skill.
    pub name: String,

    /// Kind-specific configuration.
    pub config: StepConfig,

    /// Optional guard; the step is skipped when it evaluates false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,

    /// Optional alias under which the raw output is exposed to later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,
}

impl Step {
    /// Creates a step from a name and configuration.
    pub fn new(name: impl Into<String>, config: StepConfig) -> Self {
        Self {
            name: name.into(),
            config,
            when: None,
            var_name: None,
        }
    }

    /// Creates a TOOL step.
    pub fn tool(name: impl Into<String>, config: ToolStepConfig) -> Self {
        Self::new(name, StepConfig::Tool(config))
    }

    /// Creates a PROMPT step.
    pub fn prompt(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(
            name,
            StepConfig::Prompt(PromptStepConfig {
                template: template.into(),
            }),
        )
    }

    /// Creates a TEMPLATE step.
    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(
            name,
            StepConfig::Template(TemplateStepConfig {
                template: template.into(),
            }),
        )
    }

    /// Creates an AWAIT step.
    pub fn await_input(name: impl Into<String>, config: AwaitStepConfig) -> Self {
        Self::new(name, StepConfig::Await(config))
    }

    /// Sets the `when` guard.
    pub fn with_when(mut self, when: Condition) -> Self {
        self.when = Some(when);
        self
    }

    /// Sets the output alias.
    pub fn with_var_name(mut self, var_name: impl Into<String>) -> Self {
        self.var_name = Some(var_name.into());
        self
    }

    /// The step's kind.
    pub fn kind(&self) -> StepKind {
        self.config.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_follows_config() {
        let step = Step::prompt("greet", "Say hi to {{name}}");
        assert_eq!(step.kind(), StepKind::Prompt);

        let step = Step::tool(
            "fetch",
            ToolStepConfig {
                tool_name: "kv_get".to_string(),
                input_template: json!({"key": "user"}),
                output_fields: vec![],
            },
        );
        assert_eq!(step.kind(), StepKind::Tool);
    }

    #[test]
    fn builder_attaches_guard_and_alias() {
        let step = Step::template("final", "Result: {{greeting}}")
            .with_when(Condition::parse("{{flag}} == true").unwrap())
            .with_var_name("final_text");

        assert_eq!(step.var_name.as_deref(), Some("final_text"));
        assert_eq!(step.when.as_ref().map(|c| c.raw.as_str()), Some("{{flag}} == true"));
    }

    #[test]
    fn status_terminality() {
        assert!(StepStatus::Success.is_terminal());
        assert!(StepStatus::Awaiting.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
        assert!(!StepStatus::Pending.is_terminal());
    }
}
