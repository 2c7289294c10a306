//! YAML bodies: conversion to JSON values and field-schema parsing.

use serde_json::Value as Json;
use serde_yaml::Value as Yaml;
use skein_core::{FieldSpec, FieldType, ValidationRule};

use crate::error::{ParseError, Result};

/// Parses a fenced YAML (or JSON — YAML is a superset) body into a JSON
/// value, mapping the YAML error location onto document lines.
pub(crate) fn parse_yaml_block(body: &str, fence_line: usize) -> Result<Json> {
    if body.trim().is_empty() {
        return Ok(Json::Object(serde_json::Map::new()));
    }
    let parsed: Yaml = serde_yaml::from_str(body).map_err(|e| {
        let mut err = ParseError::new(
            fence_line + e.location().map(|l| l.line()).unwrap_or(0),
            format!("invalid yaml: {e}"),
        );
        if let Some(location) = e.location() {
            err = err.with_column(location.column());
        }
        err
    })?;
    Ok(yaml_to_json(&parsed))
}

/// Converts a YAML value into a JSON value, preserving mapping order.
/// Non-string mapping keys are stringified; unrepresentable entries are
/// dropped.
pub(crate) fn yaml_to_json(value: &Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Json::Number)
                    .unwrap_or(Json::Null)
            }
        }
        Yaml::String(s) => Json::String(s.clone()),
        Yaml::Sequence(items) => Json::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                if let Some(key) = yaml_key_to_string(key) {
                    out.insert(key, yaml_to_json(item));
                }
            }
            Json::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn yaml_key_to_string(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Converts a JSON value back into a YAML value, for serialisation.
pub(crate) fn json_to_yaml(value: &Json) -> Yaml {
    match value {
        Json::Null => Yaml::Null,
        Json::Bool(b) => Yaml::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Yaml::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Yaml::Number(u.into())
            } else {
                Yaml::Number(n.as_f64().unwrap_or(0.0).into())
            }
        }
        Json::String(s) => Yaml::String(s.clone()),
        Json::Array(items) => Yaml::Sequence(items.iter().map(json_to_yaml).collect()),
        Json::Object(map) => {
            let mut out = serde_yaml::Mapping::new();
            for (key, item) in map {
                out.insert(Yaml::String(key.clone()), json_to_yaml(item));
            }
            Yaml::Mapping(out)
        }
    }
}

/// Parses a schema mapping into field specs.
///
/// Shorthand entries (`name: string`) get the given `required_default`;
/// full entries read `type`, `required`, `description`, `placeholder`,
/// `default`, `options`, `ui_hint` and `validation`.
pub(crate) fn parse_field_specs(
    value: &Json,
    required_default: bool,
    line: usize,
) -> Result<Vec<FieldSpec>> {
    let Json::Object(map) = value else {
        return Err(ParseError::new(line, "schema must be a mapping of fields"));
    };

    let mut fields = Vec::new();
    for (name, body) in map {
        fields.push(parse_field_spec(name, body, required_default, line)?);
    }
    Ok(fields)
}

fn parse_field_spec(
    name: &str,
    body: &Json,
    required_default: bool,
    line: usize,
) -> Result<FieldSpec> {
    match body {
        Json::String(type_name) => {
            let field_type = parse_field_type(name, type_name, line)?;
            Ok(FieldSpec::new(name, field_type).with_required(required_default))
        }
        Json::Object(map) => {
            let field_type = match map.get("type") {
                Some(Json::String(type_name)) => parse_field_type(name, type_name, line)?,
                Some(other) => {
                    return Err(ParseError::new(
                        line,
                        format!("field '{name}': 'type' must be a string, got {other}"),
                    ))
                }
                None => FieldType::String,
            };
            let mut spec = FieldSpec::new(name, field_type).with_required(
                map.get("required")
                    .and_then(Json::as_bool)
                    .unwrap_or(required_default),
            );
            if let Some(description) = map.get("description").and_then(Json::as_str) {
                spec = spec.with_description(description);
            }
            if let Some(placeholder) = map.get("placeholder").and_then(Json::as_str) {
                spec.placeholder = Some(placeholder.to_string());
            }
            if let Some(default) = map.get("default").or_else(|| map.get("default_value")) {
                spec = spec.with_default(default.clone());
            }
            if let Some(Json::Array(options)) = map.get("options") {
                spec = spec.with_options(options.clone());
            }
            if let Some(ui_hint) = map.get("ui_hint").and_then(Json::as_str) {
                spec.ui_hint = Some(ui_hint.to_string());
            }
            if let Some(validation) = map.get("validation") {
                spec = spec.with_validation(parse_validation(name, validation, line)?);
            }
            Ok(spec)
        }
        other => Err(ParseError::new(
            line,
            format!("field '{name}': expected a type name or a mapping, got {other}"),
        )),
    }
}

fn parse_field_type(field: &str, type_name: &str, line: usize) -> Result<FieldType> {
    FieldType::parse(type_name).ok_or_else(|| {
        ParseError::new(
            line,
            format!("field '{field}': unknown type '{type_name}'"),
        )
    })
}

fn parse_validation(field: &str, value: &Json, line: usize) -> Result<ValidationRule> {
    let Json::Object(map) = value else {
        return Err(ParseError::new(
            line,
            format!("field '{field}': 'validation' must be a mapping"),
        ));
    };
    Ok(ValidationRule {
        pattern: map.get("pattern").and_then(Json::as_str).map(String::from),
        min: map.get("min").and_then(Json::as_f64),
        max: map.get("max").and_then(Json::as_f64),
        min_items: map
            .get("min_items")
            .and_then(Json::as_u64)
            .map(|v| v as usize),
        max_items: map
            .get("max_items")
            .and_then(Json::as_u64)
            .map(|v| v as usize),
        message: map.get("message").and_then(Json::as_str).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shorthand_fields_take_the_context_default() {
        let value = parse_yaml_block("name: string\ncount: number\n", 1).unwrap();

        let inputs = parse_field_specs(&value, true, 1).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].name, "name");
        assert!(inputs[0].required);
        assert_eq!(inputs[1].field_type, FieldType::Number);

        let outputs = parse_field_specs(&value, false, 1).unwrap();
        assert!(!outputs[0].required);
    }

    #[test]
    fn full_form_fields_read_every_key() {
        let body = r#"
query:
  type: string
  required: true
  description: "what to search for"
  placeholder: "enter a query"
  default: "all"
  options: ["all", "recent"]
  ui_hint: dropdown
  validation:
    pattern: "^[a-z]+$"
    message: "lowercase only"
"#;
        let value = parse_yaml_block(body, 1).unwrap();
        let fields = parse_field_specs(&value, true, 1).unwrap();
        let query = &fields[0];
        assert_eq!(query.name, "query");
        assert!(query.required);
        assert_eq!(query.description.as_deref(), Some("what to search for"));
        assert_eq!(query.default_value, Some(json!("all")));
        assert_eq!(query.options.len(), 2);
        assert_eq!(query.ui_hint.as_deref(), Some("dropdown"));
        let validation = query.validation.as_ref().unwrap();
        assert_eq!(validation.pattern.as_deref(), Some("^[a-z]+$"));
        assert_eq!(validation.message.as_deref(), Some("lowercase only"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let value = parse_yaml_block("name: text\n", 4).unwrap();
        let err = parse_field_specs(&value, true, 4).unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("unknown type"));
    }

    #[test]
    fn yaml_errors_carry_block_relative_lines() {
        let err = parse_yaml_block("ok: 1\n  bad indent: [\n", 10).unwrap_err();
        assert!(err.line >= 10);
        assert!(err.message.contains("invalid yaml"));
    }

    #[test]
    fn yaml_json_round_trip_preserves_order() {
        let value = parse_yaml_block("b: 1\na: 2\nc:\n  - x\n  - y\n", 1).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a", "c"]);

        let yaml = json_to_yaml(&value);
        let back = yaml_to_json(&yaml);
        assert_eq!(value, back);
    }
}
