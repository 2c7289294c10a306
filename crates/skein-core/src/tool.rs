//! Tool definitions consumed by TOOL steps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::field::{find_field, FieldSpec};

/// Definition of a tool available to TOOL steps: its name and the parameters
/// its input accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (unique identifier).
    pub name: String,

    /// Human-readable description of what the tool does.
    #[serde(default)]
    pub description: String,

    /// Parameters accepted by the tool.
    #[serde(default)]
    pub parameters: Vec<FieldSpec>,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a parameter.
    pub fn with_parameter(mut self, parameter: FieldSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Get a parameter by name.
    pub fn get_parameter(&self, name: &str) -> Option<&FieldSpec> {
        find_field(&self.parameters, name)
    }

    /// Validate a rendered input mapping against this tool's parameters.
    ///
    /// Required parameters without a default must be present; provided
    /// values must pass their parameter's checks.
    pub fn validate_args(&self, args: &Value) -> Result<()> {
        let empty = serde_json::Map::new();
        let args_obj = args.as_object().unwrap_or(&empty);

        for param in self.parameters.iter().filter(|p| p.required) {
            if !args_obj.contains_key(&param.name) && param.default_value.is_none() {
                return Err(Error::MissingField(param.name.clone()));
            }
        }

        for (key, value) in args_obj {
            if let Some(param) = self.get_parameter(key) {
                param.validate_value(value)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;
    use serde_json::json;

    fn kv_tool() -> ToolDefinition {
        ToolDefinition::new("kv_get")
            .with_description("Reads a key from the key-value store")
            .with_parameter(FieldSpec::string("key"))
            .with_parameter(FieldSpec::new("limit", FieldType::Number).optional())
    }

    #[test]
    fn validate_args_accepts_valid_input() {
        let tool = kv_tool();
        assert!(tool.validate_args(&json!({"key": "user"})).is_ok());
        assert!(tool
            .validate_args(&json!({"key": "user", "limit": 3}))
            .is_ok());
    }

    #[test]
    fn validate_args_rejects_missing_required() {
        let tool = kv_tool();
        assert!(matches!(
            tool.validate_args(&json!({})),
            Err(Error::MissingField(name)) if name == "key"
        ));
    }

    #[test]
    fn validate_args_rejects_wrong_type() {
        let tool = kv_tool();
        assert!(matches!(
            tool.validate_args(&json!({"key": "user", "limit": "3"})),
            Err(Error::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn validate_args_ignores_unknown_keys() {
        let tool = kv_tool();
        assert!(tool
            .validate_args(&json!({"key": "user", "extra": true}))
            .is_ok());
    }
}
