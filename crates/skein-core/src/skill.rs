//! The skill descriptor: an immutable, parsed workflow definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::FieldSpec;
use crate::step::Step;

/// Kind of an external reference declared by a skill document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Markdown document.
    Markdown,
    /// YAML document.
    Yaml,
    /// JSON document.
    Json,
    /// Plain text.
    Text,
    /// Anything else.
    Other,
}

impl ReferenceKind {
    /// Infers the kind from a path's extension.
    pub fn from_path(path: &str) -> Self {
        match path.rsplit('.').next() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("yaml") | Some("yml") => Self::Yaml,
            Some("json") => Self::Json,
            Some("txt") => Self::Text,
            _ => Self::Other,
        }
    }
}

/// An external asset referenced by a skill document.
///
/// The descriptor only carries the slot; loading content is the embedder's
/// concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Name the reference is known by (the file stem).
    pub name: String,
    /// Declared path.
    pub path: String,
    /// Inferred content kind.
    pub kind: ReferenceKind,
}

impl Reference {
    /// Creates a reference from a declared path.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .rsplit('/')
            .next()
            .unwrap_or(&path)
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| path.clone());
        let kind = ReferenceKind::from_path(&path);
        Self { name, path, kind }
    }
}

/// A parsed, validated skill: identity, schemas and the ordered steps.
///
/// Skills are created by the parser and read-only afterwards; one parsed
/// skill may back any number of concurrent executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Skill identifier.
    pub id: String,

    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// What the skill does.
    #[serde(default)]
    pub description: String,

    /// Intents the skill answers to, in declaration order.
    #[serde(default)]
    pub intents: Vec<String>,

    /// Declared inputs.
    #[serde(default)]
    pub input_schema: Vec<FieldSpec>,

    /// Ordered steps; never empty.
    pub steps: Vec<Step>,

    /// Declared shape of the final output; may be empty.
    #[serde(default)]
    pub output_contract: Vec<FieldSpec>,

    /// External references declared in the document.
    #[serde(default)]
    pub references: Vec<Reference>,

    /// `x-*` extension sections, verbatim.
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl Skill {
    /// Creates a skill with the given id and no steps yet. The id is
    /// trimmed; building an id-less skill is rejected by [`Skill::validate`].
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            version: None,
            description: String::new(),
            intents: Vec::new(),
            input_schema: Vec::new(),
            steps: Vec::new(),
            output_contract: Vec::new(),
            references: Vec::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an intent.
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intents.push(intent.into());
        self
    }

    /// Adds an input field.
    pub fn with_input(mut self, field: FieldSpec) -> Self {
        self.input_schema.push(field);
        self
    }

    /// Adds a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Adds an output contract field.
    pub fn with_output(mut self, field: FieldSpec) -> Self {
        self.output_contract.push(field);
        self
    }

    /// Gets a step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Checks the model invariants: a non-empty id, at least one step, and
    /// unique step names.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidSkill("skill id is empty".to_string()));
        }
        if self.steps.is_empty() {
            return Err(Error::InvalidSkill(format!(
                "skill '{}' declares no steps",
                self.id
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                return Err(Error::InvalidSkill(format!(
                    "skill '{}' has a step with an empty name",
                    self.id
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(Error::InvalidSkill(format!(
                    "duplicate step name '{}' in skill '{}'",
                    step.name, self.id
                )));
            }
        }
        Ok(())
    }
}

/// A listing entry for one skill, as returned by repositories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSummary {
    /// Skill identifier.
    pub id: String,
    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// What the skill does.
    pub description: String,
    /// Intents the skill answers to.
    pub intents: Vec<String>,
    /// Declared inputs.
    pub input_schema: Vec<FieldSpec>,
    /// Declared output shape.
    pub output_schema: Vec<FieldSpec>,
}

impl From<&Skill> for SkillSummary {
    fn from(skill: &Skill) -> Self {
        Self {
            id: skill.id.clone(),
            version: skill.version.clone(),
            description: skill.description.clone(),
            intents: skill.intents.clone(),
            input_schema: skill.input_schema.clone(),
            output_schema: skill.output_contract.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Step;

    fn minimal() -> Skill {
        Skill::new("demo").with_step(Step::template("only", "x"))
    }

    #[test]
    fn new_trims_the_id() {
        assert_eq!(Skill::new("  spaced  ").id, "spaced");
    }

    #[test]
    fn validate_accepts_minimal_skill() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_id_and_steps() {
        assert!(Skill::new("   ")
            .with_step(Step::template("s", "x"))
            .validate()
            .is_err());
        assert!(Skill::new("no-steps").validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_step_names() {
        let skill = Skill::new("dup")
            .with_step(Step::template("a", "1"))
            .with_step(Step::template("a", "2"));
        assert!(matches!(skill.validate(), Err(Error::InvalidSkill(_))));
    }

    #[test]
    fn get_step_finds_by_name() {
        let skill = minimal();
        assert!(skill.get_step("only").is_some());
        assert!(skill.get_step("other").is_none());
    }

    #[test]
    fn reference_kind_inference() {
        let r = Reference::from_path("guides/style.md");
        assert_eq!(r.name, "style");
        assert_eq!(r.kind, ReferenceKind::Markdown);
        assert_eq!(Reference::from_path("data.json").kind, ReferenceKind::Json);
        assert_eq!(Reference::from_path("blob.bin").kind, ReferenceKind::Other);
    }

    #[test]
    fn summary_mirrors_the_descriptor() {
        let skill = minimal().with_description("demo skill").with_version("1.0.0");
        let summary = SkillSummary::from(&skill);
        assert_eq!(summary.id, "demo");
        assert_eq!(summary.version.as_deref(), Some("1.0.0"));
        assert_eq!(summary.description, "demo skill");
    }
}
