//! Final-output assembly and contract validation.

use serde_json::Value;
use skein_core::{json_type_name, FieldSpec};
use skein_expr::{lookup_path, VarMap};

/// Assembles the final output mapping from the variable view.
///
/// Every contract key is present in the result: a bare name reads the
/// binding under that name (alias, step name or tool variable), a dotted
/// name resolves as a path, and anything unbound becomes `null`.
pub fn assemble_output(view: &VarMap, contract: &[FieldSpec]) -> Value {
    let mut out = serde_json::Map::new();
    for field in contract {
        let value = if field.name.contains('.') || field.name.contains('[') {
            lookup_path(&field.name, view)
        } else {
            view.get(&field.name)
                .map(|bound| bound.raw().clone())
                .unwrap_or(Value::Null)
        };
        out.insert(field.name.clone(), value);
    }
    Value::Object(out)
}

/// Checks an assembled output against the contract: required fields must
/// be present and non-null, present fields must coarsely match their
/// declared type. Returns the failure message, or `None` when the output
/// passes.
pub fn validate_output(output: &Value, contract: &[FieldSpec]) -> Option<String> {
    let empty = serde_json::Map::new();
    let map = output.as_object().unwrap_or(&empty);

    let mut errors = Vec::new();
    for field in contract {
        let value = map.get(&field.name).unwrap_or(&Value::Null);
        if value.is_null() {
            if field.required {
                errors.push(format!("required output '{}' is missing", field.name));
            }
            continue;
        }
        if !field.field_type.matches(value) {
            errors.push(format!(
                "output '{}' must be {}, got {}",
                field.name,
                field.field_type.as_str(),
                json_type_name(value)
            ));
        }
    }

    if errors.is_empty() {
        None
    } else {
        Some(format!("output contract violated: {}", errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skein_core::FieldType;
    use skein_expr::VarValue;

    fn view(pairs: &[(&str, VarValue)]) -> VarMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn assemble_reads_bare_names_and_paths() {
        let view = view(&[
            ("final_text", VarValue::Plain(json!("done"))),
            ("report", VarValue::StepOutput(json!({"score": 9}))),
        ]);
        let contract = vec![
            FieldSpec::string("final_text"),
            FieldSpec::new("report.score", FieldType::Number),
            FieldSpec::string("absent").optional(),
        ];

        let output = assemble_output(&view, &contract);
        assert_eq!(output["final_text"], json!("done"));
        assert_eq!(output["report.score"], json!(9));
        assert_eq!(output["absent"], json!(null));
    }

    #[test]
    fn assemble_with_empty_contract_is_empty() {
        let output = assemble_output(&VarMap::new(), &[]);
        assert_eq!(output, json!({}));
    }

    #[test]
    fn validate_passes_a_conforming_output() {
        let contract = vec![FieldSpec::string("text"), FieldSpec::string("note").optional()];
        let output = json!({"text": "hi", "note": null});
        assert_eq!(validate_output(&output, &contract), None);
    }

    #[test]
    fn validate_reports_missing_required_fields() {
        let contract = vec![FieldSpec::string("text")];
        let message = validate_output(&json!({"text": null}), &contract).unwrap();
        assert!(message.contains("required output 'text' is missing"));
    }

    #[test]
    fn validate_reports_type_mismatches() {
        let contract = vec![FieldSpec::new("count", FieldType::Number)];
        let message = validate_output(&json!({"count": "three"}), &contract).unwrap();
        assert!(message.contains("must be number, got string"));
    }
}
