//! The analysis passes.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use serde_json::Value;
use skein_core::{
    json_type_name, FieldSpec, Skill, Step, StepConfig, StepKind, ToolDefinition,
};
use skein_expr::{referenced_variables, CmpOp, CondExpr, Condition};

use crate::report::{
    IssueCategory, IssueCounts, IssueLevel, SkillValidationReport, ValidationIssue,
};

/// Static analyser for parsed skills.
///
/// Walks the steps in order, tracking which names are in scope, and
/// reports template references that cannot resolve, guard problems,
/// tool-binding mismatches and unproducible output keys. Tool checks run
/// only when the validator is given the known tool definitions.
#[derive(Debug, Default)]
pub struct SkillValidator {
    known_tools: Option<HashMap<String, ToolDefinition>>,
}

impl SkillValidator {
    /// Creates a validator with no tool knowledge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the known tools, enabling TOOL-binding checks.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.known_tools = Some(tools.into_iter().map(|t| (t.name.clone(), t)).collect());
        self
    }

    /// Analyses one skill.
    pub fn validate(&self, skill: &Skill) -> SkillValidationReport {
        let start = Instant::now();
        let mut issues = Vec::new();

        // Names resolvable at the current point of the walk.
        let mut scope: BTreeSet<String> = skill
            .input_schema
            .iter()
            .map(|f| f.name.clone())
            .collect();
        scope.insert("context".to_string());

        for step in &skill.steps {
            if let Some(when) = &step.when {
                self.check_when(when, step, &scope, &mut issues);
            }

            match &step.config {
                StepConfig::Prompt(config) => {
                    check_template(&config.template, &scope, Some(&step.name), &mut issues);
                }
                StepConfig::Template(config) => {
                    check_template(&config.template, &scope, Some(&step.name), &mut issues);
                }
                StepConfig::Tool(config) => {
                    self.check_tool_binding(step, config, &scope, &mut issues);
                }
                StepConfig::Await(_) => {}
            }

            // Bind what this step makes visible to the ones after it.
            scope.insert(step.name.clone());
            if step.kind() != StepKind::Tool {
                if let Some(alias) = &step.var_name {
                    scope.insert(alias.clone());
                }
            }
            match &step.config {
                StepConfig::Tool(config) => {
                    for field in &config.output_fields {
                        scope.insert(field.clone());
                    }
                }
                StepConfig::Await(config) => {
                    for field in &config.input_schema {
                        scope.insert(field.name.clone());
                    }
                }
                _ => {}
            }
        }

        for field in &skill.output_contract {
            let root = field
                .name
                .split(['.', '['])
                .next()
                .unwrap_or(field.name.as_str());
            if !scope.contains(root) {
                issues.push(ValidationIssue {
                    category: IssueCategory::Schema,
                    level: IssueLevel::Error,
                    step: None,
                    message: format!(
                        "output '{}' is not producible: no step, alias, input or tool variable binds '{root}'",
                        field.name
                    ),
                });
            }
        }

        check_schema_defaults(&skill.input_schema, "input", &mut issues);
        check_schema_defaults(&skill.output_contract, "output", &mut issues);

        let counts = count(&issues);
        let valid = counts.errors == 0;
        let summary = if issues.is_empty() {
            format!("skill '{}' is valid", skill.id)
        } else {
            format!(
                "skill '{}': {} error(s), {} warning(s), {} suggestion(s)",
                skill.id, counts.errors, counts.warnings, counts.suggestions
            )
        };

        SkillValidationReport {
            skill_id: skill.id.clone(),
            valid,
            summary,
            issues,
            counts,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_when(
        &self,
        when: &Condition,
        step: &Step,
        scope: &BTreeSet<String>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for root in when.path_roots() {
            if !scope.contains(&root) {
                issues.push(ValidationIssue {
                    category: IssueCategory::DataFlow,
                    level: IssueLevel::Error,
                    step: Some(step.name.clone()),
                    message: format!(
                        "guard '{}' references unknown variable '{root}'",
                        when.raw
                    ),
                });
            }
        }

        check_condition_literals(&when.expr, step, issues);

        if when.constant_value() == Some(false) {
            issues.push(ValidationIssue {
                category: IssueCategory::Logic,
                level: IssueLevel::Suggestion,
                step: Some(step.name.clone()),
                message: format!(
                    "guard '{}' is constant false; the step never executes",
                    when.raw
                ),
            });
        }
    }

    fn check_tool_binding(
        &self,
        step: &Step,
        config: &skein_core::ToolStepConfig,
        scope: &BTreeSet<String>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        check_value_templates(&config.input_template, scope, &step.name, issues);

        let Some(known_tools) = &self.known_tools else {
            return;
        };
        let Some(definition) = known_tools.get(&config.tool_name) else {
            issues.push(ValidationIssue {
                category: IssueCategory::Tool,
                level: IssueLevel::Error,
                step: Some(step.name.clone()),
                message: format!("unknown tool '{}'", config.tool_name),
            });
            return;
        };

        let Value::Object(template) = &config.input_template else {
            return;
        };
        for key in template.keys() {
            if definition.get_parameter(key).is_none() {
                issues.push(ValidationIssue {
                    category: IssueCategory::Tool,
                    level: IssueLevel::Warning,
                    step: Some(step.name.clone()),
                    message: format!(
                        "tool '{}' does not accept an input named '{key}'",
                        config.tool_name
                    ),
                });
            }
        }
        for parameter in definition.parameters.iter().filter(|p| p.required) {
            if !template.contains_key(&parameter.name) && parameter.default_value.is_none() {
                issues.push(ValidationIssue {
                    category: IssueCategory::Tool,
                    level: IssueLevel::Error,
                    step: Some(step.name.clone()),
                    message: format!(
                        "tool '{}' requires an input named '{}'",
                        config.tool_name, parameter.name
                    ),
                });
            }
        }
    }
}

fn check_template(
    template: &str,
    scope: &BTreeSet<String>,
    step: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) {
    match referenced_variables(template) {
        Err(e) => issues.push(ValidationIssue {
            category: IssueCategory::Syntax,
            level: IssueLevel::Error,
            step: step.map(String::from),
            message: e.to_string(),
        }),
        Ok(refs) => {
            // Loop-scoped names may be bound by the iteration element and
            // are not checkable statically.
            for name in &refs.outer {
                if !scope.contains(name) {
                    issues.push(ValidationIssue {
                        category: IssueCategory::DataFlow,
                        level: IssueLevel::Error,
                        step: step.map(String::from),
                        message: format!("template references unknown variable '{name}'"),
                    });
                }
            }
        }
    }
}

fn check_value_templates(
    value: &Value,
    scope: &BTreeSet<String>,
    step: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match value {
        Value::String(s) => check_template(s, scope, Some(step), issues),
        Value::Array(items) => {
            for item in items {
                check_value_templates(item, scope, step, issues);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                check_value_templates(item, scope, step, issues);
            }
        }
        _ => {}
    }
}

fn check_condition_literals(expr: &CondExpr, step: &Step, issues: &mut Vec<ValidationIssue>) {
    match expr {
        CondExpr::Compare { op, lhs, rhs } => {
            if let (CondExpr::Literal(l), CondExpr::Literal(r)) = (lhs.as_ref(), rhs.as_ref()) {
                let ordering = matches!(op, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge);
                if ordering && (!l.is_number() || !r.is_number()) {
                    issues.push(ValidationIssue {
                        category: IssueCategory::Logic,
                        level: IssueLevel::Warning,
                        step: Some(step.name.clone()),
                        message: "ordering comparison on non-numeric operands is always false"
                            .to_string(),
                    });
                } else if !ordering && json_type_name(l) != json_type_name(r) {
                    issues.push(ValidationIssue {
                        category: IssueCategory::Logic,
                        level: IssueLevel::Warning,
                        step: Some(step.name.clone()),
                        message: format!(
                            "comparison between {} and {} literals never matches",
                            json_type_name(l),
                            json_type_name(r)
                        ),
                    });
                }
            }
        }
        CondExpr::Not(inner) => check_condition_literals(inner, step, issues),
        CondExpr::And(lhs, rhs) | CondExpr::Or(lhs, rhs) => {
            check_condition_literals(lhs, step, issues);
            check_condition_literals(rhs, step, issues);
        }
        CondExpr::Literal(_) | CondExpr::Path(_) => {}
    }
}

fn check_schema_defaults(
    fields: &[FieldSpec],
    section: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in fields {
        if let Some(default) = &field.default_value {
            if !field.field_type.matches(default) {
                issues.push(ValidationIssue {
                    category: IssueCategory::Schema,
                    level: IssueLevel::Warning,
                    step: None,
                    message: format!(
                        "{section} field '{}': default value is {} but the field is {}",
                        field.name,
                        json_type_name(default),
                        field.field_type.as_str()
                    ),
                });
            }
        }
        for option in &field.options {
            if !field.field_type.matches(option) {
                issues.push(ValidationIssue {
                    category: IssueCategory::Schema,
                    level: IssueLevel::Warning,
                    step: None,
                    message: format!(
                        "{section} field '{}': option {option} does not match type {}",
                        field.name,
                        field.field_type.as_str()
                    ),
                });
            }
        }
    }
}

fn count(issues: &[ValidationIssue]) -> IssueCounts {
    let mut counts = IssueCounts::default();
    for issue in issues {
        match issue.level {
            IssueLevel::Error => counts.errors += 1,
            IssueLevel::Warning => counts.warnings += 1,
            IssueLevel::Suggestion => counts.suggestions += 1,
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skein_core::{AwaitStepConfig, FieldType, ToolStepConfig};

    fn kv_tool() -> ToolDefinition {
        ToolDefinition::new("kv_get").with_parameter(FieldSpec::string("key"))
    }

    fn tool_step(name: &str, tool: &str, input: Value) -> Step {
        Step::tool(
            name,
            ToolStepConfig {
                tool_name: tool.to_string(),
                input_template: input,
                output_fields: vec![],
            },
        )
    }

    #[test]
    fn a_clean_skill_reports_valid() {
        let skill = Skill::new("clean")
            .with_input(FieldSpec::string("name"))
            .with_step(Step::prompt("greet", "Say hi to {{name}}").with_var_name("greeting"))
            .with_step(Step::template("final", "Result: {{greeting}}"))
            .with_output(FieldSpec::string("final").optional());

        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
        assert!(report.summary.contains("valid"));
    }

    #[test]
    fn unknown_template_variable_is_a_data_flow_error() {
        let skill = Skill::new("s").with_step(Step::template("t", "{{nope}}"));

        let report = SkillValidator::new().validate(&skill);
        assert!(!report.valid);
        let issue = &report.issues[0];
        assert_eq!(issue.category, IssueCategory::DataFlow);
        assert_eq!(issue.level, IssueLevel::Error);
        assert!(issue.message.contains("'nope'"));
    }

    #[test]
    fn later_step_may_reference_earlier_outputs() {
        let skill = Skill::new("s")
            .with_step(Step::template("first", "x"))
            .with_step(Step::template("second", "{{first.value}}"));

        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn loop_scoped_names_are_not_flagged() {
        let skill = Skill::new("s")
            .with_input(FieldSpec::new("items", FieldType::Array))
            .with_step(Step::template("t", "{{#for items}}{{name}} {{_}}{{/for}}"));

        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn template_syntax_error_is_reported() {
        let skill = Skill::new("s").with_step(Step::template("t", "{{#for xs}}never closed"));

        let report = SkillValidator::new().validate(&skill);
        assert_eq!(report.issues[0].category, IssueCategory::Syntax);
        assert_eq!(report.issues[0].level, IssueLevel::Error);
    }

    #[test]
    fn unknown_tool_is_an_error_when_tools_are_known() {
        let skill = Skill::new("s").with_step(tool_step("fetch", "no_such", json!({})));

        let report = SkillValidator::new()
            .with_tools(vec![kv_tool()])
            .validate(&skill);
        assert!(!report.valid);
        assert_eq!(report.issues[0].category, IssueCategory::Tool);
        assert!(report.issues[0].message.contains("unknown tool"));

        // Without tool knowledge the binding is not checked.
        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid);
    }

    #[test]
    fn tool_input_keys_are_checked_against_the_definition() {
        let skill = Skill::new("s").with_step(tool_step(
            "fetch",
            "kv_get",
            json!({"tkey": "oops"}),
        ));

        let report = SkillValidator::new()
            .with_tools(vec![kv_tool()])
            .validate(&skill);

        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.level == IssueLevel::Warning && i.message.contains("'tkey'")));
        assert!(report
            .issues
            .iter()
            .any(|i| i.level == IssueLevel::Error && i.message.contains("requires an input named 'key'")));
    }

    #[test]
    fn unknown_guard_variable_is_flagged() {
        let skill = Skill::new("s").with_step(
            Step::template("t", "x").with_when(Condition::parse("{{ghost}} == 1").unwrap()),
        );

        let report = SkillValidator::new().validate(&skill);
        assert!(!report.valid);
        assert_eq!(report.issues[0].category, IssueCategory::DataFlow);
        assert!(report.issues[0].message.contains("'ghost'"));
    }

    #[test]
    fn constant_false_guard_is_a_suggestion() {
        let skill = Skill::new("s")
            .with_step(Step::template("dead", "x").with_when(Condition::parse("false").unwrap()))
            .with_step(Step::template("live", "y"));

        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid);
        let issue = &report.issues[0];
        assert_eq!(issue.category, IssueCategory::Logic);
        assert_eq!(issue.level, IssueLevel::Suggestion);
        assert!(issue.message.contains("never executes"));
        assert_eq!(report.counts.suggestions, 1);
    }

    #[test]
    fn incompatible_literal_comparison_warns() {
        let skill = Skill::new("s").with_step(
            Step::template("t", "x")
                .with_when(Condition::parse("\"a\" == 1 && \"b\" < 2").unwrap()),
        );

        let report = SkillValidator::new().validate(&skill);
        assert_eq!(report.counts.warnings, 2);
    }

    #[test]
    fn unproducible_output_key_is_a_schema_error() {
        let skill = Skill::new("s")
            .with_step(Step::template("made", "x"))
            .with_output(FieldSpec::string("made").optional())
            .with_output(FieldSpec::string("ghost").optional());

        let report = SkillValidator::new().validate(&skill);
        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|i| i.category == IssueCategory::Schema && i.message.contains("'ghost'")));
    }

    #[test]
    fn aliases_await_fields_and_tool_outputs_are_producible() {
        let skill = Skill::new("s")
            .with_step(Step::tool(
                "fetch",
                ToolStepConfig {
                    tool_name: "kv_get".to_string(),
                    input_template: json!({"key": "user"}),
                    output_fields: vec!["user_name".to_string()],
                },
            ))
            .with_step(Step::await_input(
                "confirm",
                AwaitStepConfig {
                    message: "ok?".to_string(),
                    input_schema: vec![FieldSpec::new("approved", FieldType::Boolean)],
                },
            ))
            .with_step(Step::template("final", "{{user_name}} {{approved}}").with_var_name("final_text"))
            .with_output(FieldSpec::string("final_text").optional())
            .with_output(FieldSpec::new("approved", FieldType::Boolean).optional())
            .with_output(FieldSpec::string("user_name").optional());

        let report = SkillValidator::new().validate(&skill);
        assert!(report.valid, "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn mismatched_default_value_warns() {
        let skill = Skill::new("s")
            .with_input(FieldSpec::new("count", FieldType::Number).with_default(json!("three")))
            .with_step(Step::template("t", "{{count}}"));

        let report = SkillValidator::new().validate(&skill);
        assert_eq!(report.counts.warnings, 1);
        assert!(report.issues[0].message.contains("default value"));
    }

    #[test]
    fn validates_a_parsed_document() {
        let source = "# skill: doc\n## steps\n### step: t\n```template\n{{missing}}\n```\n";
        let skill = skein_parser::parse_skill(source).unwrap();
        let report = SkillValidator::new().validate(&skill);
        assert!(!report.valid);
        assert_eq!(report.skill_id, "doc");
        assert_eq!(report.counts.errors, 1);
    }
}
