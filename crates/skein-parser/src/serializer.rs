//! Canonical re-serialisation of a skill back to Markdown.
//!
//! `parse_skill(to_markdown(&skill))` yields a model equal to `skill`; the
//! round trip is what keeps the descriptor and the document form honest
//! with each other.

use serde_yaml::Value as Yaml;
use skein_core::{FieldSpec, Skill, StepConfig, ValidationRule};

use crate::schema::json_to_yaml;

/// Renders a skill as a Markdown document.
pub fn to_markdown(skill: &Skill) -> String {
    let mut out = String::new();
    out.push_str(&format!("# skill: {}\n", skill.id));

    if let Some(version) = &skill.version {
        out.push_str(&format!("\n## version\n{version}\n"));
    }

    if !skill.description.is_empty() {
        out.push_str(&format!("\n## description\n{}\n", skill.description));
    }

    if !skill.intents.is_empty() {
        out.push_str("\n## intent\n");
        for intent in &skill.intents {
            out.push_str(&format!("- {intent}\n"));
        }
    }

    if !skill.input_schema.is_empty() {
        out.push_str("\n## input\n");
        out.push_str(&yaml_fence(&schema_to_yaml(&skill.input_schema)));
    }

    out.push_str("\n## steps\n");
    for step in &skill.steps {
        out.push_str(&format!("\n### step: {}\n", step.name));
        out.push_str(&format!("**type**: {}\n", step.kind()));
        if let StepConfig::Tool(config) = &step.config {
            out.push_str(&format!("**tool**: {}\n", config.tool_name));
        }
        if let Some(alias) = &step.var_name {
            out.push_str(&format!("**varName**: {alias}\n"));
        }
        if let Some(when) = &step.when {
            out.push_str(&format!("**when**: {}\n", when.raw));
        }
        match &step.config {
            StepConfig::Tool(config) => {
                let mut body = json_to_yaml(&config.input_template);
                if !config.output_fields.is_empty() {
                    if let Yaml::Mapping(map) = &mut body {
                        let mut schema = serde_yaml::Mapping::new();
                        for field in &config.output_fields {
                            schema.insert(
                                Yaml::String(field.clone()),
                                Yaml::String("string".to_string()),
                            );
                        }
                        map.insert(
                            Yaml::String("output_schema".to_string()),
                            Yaml::Mapping(schema),
                        );
                    }
                }
                out.push_str(&yaml_fence(&body));
            }
            StepConfig::Prompt(config) => {
                out.push_str(&format!("```prompt\n{}\n```\n", config.template));
            }
            StepConfig::Template(config) => {
                out.push_str(&format!("```template\n{}\n```\n", config.template));
            }
            StepConfig::Await(config) => {
                let mut body = serde_yaml::Mapping::new();
                body.insert(
                    Yaml::String("message".to_string()),
                    Yaml::String(config.message.clone()),
                );
                body.insert(
                    Yaml::String("input_schema".to_string()),
                    schema_to_yaml(&config.input_schema),
                );
                out.push_str(&yaml_fence(&Yaml::Mapping(body)));
            }
        }
    }

    if !skill.output_contract.is_empty() {
        out.push_str("\n## output\n");
        out.push_str(&yaml_fence(&schema_to_yaml(&skill.output_contract)));
    }

    for (key, value) in &skill.extensions {
        out.push_str(&format!("\n## {key}\n{value}\n"));
    }

    if !skill.references.is_empty() {
        out.push('\n');
        for reference in &skill.references {
            out.push_str(&format!("<!-- reference: {} -->\n", reference.path));
        }
    }

    out
}

fn yaml_fence(value: &Yaml) -> String {
    let body = serde_yaml::to_string(value).unwrap_or_default();
    format!("```yaml\n{body}```\n")
}

fn schema_to_yaml(fields: &[FieldSpec]) -> Yaml {
    let mut map = serde_yaml::Mapping::new();
    for field in fields {
        map.insert(Yaml::String(field.name.clone()), field_to_yaml(field));
    }
    Yaml::Mapping(map)
}

fn field_to_yaml(field: &FieldSpec) -> Yaml {
    let mut map = serde_yaml::Mapping::new();
    map.insert(
        Yaml::String("type".to_string()),
        Yaml::String(field.field_type.as_str().to_string()),
    );
    map.insert(Yaml::String("required".to_string()), Yaml::Bool(field.required));
    if let Some(description) = &field.description {
        map.insert(
            Yaml::String("description".to_string()),
            Yaml::String(description.clone()),
        );
    }
    if let Some(placeholder) = &field.placeholder {
        map.insert(
            Yaml::String("placeholder".to_string()),
            Yaml::String(placeholder.clone()),
        );
    }
    if let Some(default) = &field.default_value {
        map.insert(Yaml::String("default".to_string()), json_to_yaml(default));
    }
    if !field.options.is_empty() {
        map.insert(
            Yaml::String("options".to_string()),
            Yaml::Sequence(field.options.iter().map(json_to_yaml).collect()),
        );
    }
    if let Some(ui_hint) = &field.ui_hint {
        map.insert(
            Yaml::String("ui_hint".to_string()),
            Yaml::String(ui_hint.clone()),
        );
    }
    if let Some(validation) = &field.validation {
        map.insert(
            Yaml::String("validation".to_string()),
            validation_to_yaml(validation),
        );
    }
    Yaml::Mapping(map)
}

fn validation_to_yaml(rule: &ValidationRule) -> Yaml {
    let mut map = serde_yaml::Mapping::new();
    if let Some(pattern) = &rule.pattern {
        map.insert(
            Yaml::String("pattern".to_string()),
            Yaml::String(pattern.clone()),
        );
    }
    if let Some(min) = rule.min {
        map.insert(Yaml::String("min".to_string()), Yaml::Number(min.into()));
    }
    if let Some(max) = rule.max {
        map.insert(Yaml::String("max".to_string()), Yaml::Number(max.into()));
    }
    if let Some(min_items) = rule.min_items {
        map.insert(
            Yaml::String("min_items".to_string()),
            Yaml::Number((min_items as u64).into()),
        );
    }
    if let Some(max_items) = rule.max_items {
        map.insert(
            Yaml::String("max_items".to_string()),
            Yaml::Number((max_items as u64).into()),
        );
    }
    if let Some(message) = &rule.message {
        map.insert(
            Yaml::String("message".to_string()),
            Yaml::String(message.clone()),
        );
    }
    Yaml::Mapping(map)
}
