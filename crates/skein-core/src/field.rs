//! Field specifications for input schemas, output contracts, await prompts
//! and tool parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// String field.
    #[default]
    String,
    /// Numeric field (integer or float).
    Number,
    /// Boolean field.
    Boolean,
    /// Array field.
    Array,
    /// Object field.
    Object,
}

impl FieldType {
    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Parses a type name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" | "integer" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// Checks whether a JSON value matches this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::String(_)) => true,
            (Self::Number, Value::Number(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            (Self::Object, Value::Object(_)) => true,
            _ => false,
        }
    }
}

/// Get the JSON type name for a value.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Declared validation constraints on a field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationRule {
    /// Regex the string value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Minimum numeric value (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Maximum numeric value (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum number of array items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,

    /// Maximum number of array items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,

    /// Message reported when the rule fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidationRule {
    fn failure(&self, fallback: String) -> String {
        self.message.clone().unwrap_or(fallback)
    }

    /// Checks a value against the rule. Constraints that do not apply to the
    /// value's type are skipped.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if let (Some(pattern), Value::String(s)) = (&self.pattern, value) {
            let re = regex::Regex::new(pattern)
                .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
            if !re.is_match(s) {
                return Err(self.failure(format!("value does not match pattern '{pattern}'")));
            }
        }
        if let Value::Number(n) = value {
            if let Some(f) = n.as_f64() {
                if let Some(min) = self.min {
                    if f < min {
                        return Err(self.failure(format!("value is below minimum {min}")));
                    }
                }
                if let Some(max) = self.max {
                    if f > max {
                        return Err(self.failure(format!("value is above maximum {max}")));
                    }
                }
            }
        }
        if let Value::Array(items) = value {
            if let Some(min_items) = self.min_items {
                if items.len() < min_items {
                    return Err(self.failure(format!("fewer than {min_items} items")));
                }
            }
            if let Some(max_items) = self.max_items {
                if items.len() > max_items {
                    return Err(self.failure(format!("more than {max_items} items")));
                }
            }
        }
        Ok(())
    }
}

/// Specification of one named field.
///
/// Used for skill input schemas, output contracts, await input prompts and
/// tool parameter lists alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The field name.
    pub name: String,

    /// The field type.
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    /// Whether this field must be provided.
    #[serde(default = "default_true")]
    pub required: bool,

    /// Description of the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Placeholder text for interactive surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Default value applied when the field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    /// Enumerated allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,

    /// Rendering hint, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_hint: Option<String>,

    /// Validation constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

impl FieldSpec {
    /// Creates a required field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            description: None,
            placeholder: None,
            default_value: None,
            options: Vec::new(),
            ui_hint: None,
            validation: None,
        }
    }

    /// Creates a required string field.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Marks the field optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets whether the field is required.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Sets the enumerated allowed values.
    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = options;
        self
    }

    /// Sets the validation constraints.
    pub fn with_validation(mut self, validation: ValidationRule) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Full check of one provided value: type, options and validation rules.
    pub fn validate_value(&self, value: &Value) -> Result<()> {
        if !self.field_type.matches(value) {
            return Err(Error::InvalidFieldType {
                name: self.name.clone(),
                expected: self.field_type.as_str().to_string(),
                actual: json_type_name(value).to_string(),
            });
        }
        if !self.options.is_empty() && !self.options.contains(value) {
            return Err(Error::FieldValidation {
                name: self.name.clone(),
                message: format!("value must be one of {:?}", self.options),
            });
        }
        if let Some(rule) = &self.validation {
            rule.check(value).map_err(|message| Error::FieldValidation {
                name: self.name.clone(),
                message,
            })?;
        }
        Ok(())
    }
}

/// Finds a field by name in a schema.
pub fn find_field<'a>(fields: &'a [FieldSpec], name: &str) -> Option<&'a FieldSpec> {
    fields.iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_type_matching() {
        assert!(FieldType::String.matches(&json!("x")));
        assert!(FieldType::Number.matches(&json!(1.5)));
        assert!(FieldType::Boolean.matches(&json!(true)));
        assert!(FieldType::Array.matches(&json!([])));
        assert!(FieldType::Object.matches(&json!({})));
        assert!(!FieldType::Number.matches(&json!("1")));
    }

    #[test]
    fn field_type_parse_accepts_integer_alias() {
        assert_eq!(FieldType::parse("integer"), Some(FieldType::Number));
        assert_eq!(FieldType::parse("weird"), None);
    }

    #[test]
    fn validate_value_checks_type_and_options() {
        let spec = FieldSpec::string("mode").with_options(vec![json!("fast"), json!("slow")]);

        assert!(spec.validate_value(&json!("fast")).is_ok());
        assert!(matches!(
            spec.validate_value(&json!("other")),
            Err(Error::FieldValidation { .. })
        ));
        assert!(matches!(
            spec.validate_value(&json!(1)),
            Err(Error::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn validation_rule_bounds() {
        let rule = ValidationRule {
            min: Some(1.0),
            max: Some(10.0),
            ..Default::default()
        };
        assert!(rule.check(&json!(5)).is_ok());
        assert!(rule.check(&json!(0)).is_err());
        assert!(rule.check(&json!(11)).is_err());
        // Non-numeric values skip numeric bounds.
        assert!(rule.check(&json!("text")).is_ok());
    }

    #[test]
    fn validation_rule_pattern_and_custom_message() {
        let rule = ValidationRule {
            pattern: Some("^[a-z]+$".to_string()),
            message: Some("lowercase only".to_string()),
            ..Default::default()
        };
        assert!(rule.check(&json!("abc")).is_ok());
        assert_eq!(rule.check(&json!("ABC")), Err("lowercase only".to_string()));
    }

    #[test]
    fn serde_shape_uses_type_key() {
        let spec = FieldSpec::new("query", FieldType::String).with_description("the query");
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], json!("string"));
        assert_eq!(value["required"], json!(true));
    }
}
