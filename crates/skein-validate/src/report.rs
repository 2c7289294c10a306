//! Validation report types.

use serde::{Deserialize, Serialize};

/// What part of the skill an issue concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    /// Malformed template or expression syntax.
    Syntax,
    /// Schema and contract problems.
    Schema,
    /// Guards and control flow.
    Logic,
    /// Tool bindings.
    Tool,
    /// Variable references and data availability.
    DataFlow,
}

impl IssueCategory {
    /// Returns the category name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "SYNTAX",
            Self::Schema => "SCHEMA",
            Self::Logic => "LOGIC",
            Self::Tool => "TOOL",
            Self::DataFlow => "DATA_FLOW",
        }
    }
}

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueLevel {
    /// The skill will not execute correctly.
    Error,
    /// Suspicious; likely a mistake.
    Warning,
    /// Worth a look.
    Suggestion,
}

impl IssueLevel {
    /// Returns the level name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Suggestion => "SUGGESTION",
        }
    }
}

/// One finding of the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// What the issue concerns.
    pub category: IssueCategory,
    /// How serious it is.
    pub level: IssueLevel,
    /// The step it was found in, when step-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// What is wrong.
    pub message: String,
}

/// Issue totals by level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    /// Number of errors.
    pub errors: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of suggestions.
    pub suggestions: usize,
}

/// The result of statically analysing one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillValidationReport {
    /// Id of the analysed skill.
    pub skill_id: String,
    /// Whether the skill has no errors.
    pub valid: bool,
    /// One-line human summary.
    pub summary: String,
    /// Every finding, in discovery order.
    pub issues: Vec<ValidationIssue>,
    /// Totals by level.
    pub counts: IssueCounts,
    /// How long the analysis took, in milliseconds.
    pub duration_ms: u64,
}

impl SkillValidationReport {
    /// Findings at a given level.
    pub fn at_level(&self, level: IssueLevel) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.level == level)
    }
}
