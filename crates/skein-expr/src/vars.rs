//! The variable view consumed by the evaluators.
//!
//! Step outputs are bound under their step name in a wrapped form so that
//! `{{step}}` renders like the raw output while `{{step.value}}` (and, for
//! mapping outputs, `{{step.field}}`) still resolve. Aliased outputs, inputs,
//! await inputs and tool-written variables are bound plain.

use serde_json::Value;
use std::collections::HashMap;

/// The variable store a template or condition is evaluated against.
pub type VarMap = HashMap<String, VarValue>;

/// A value bound in the variable view.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// An ordinary value: inputs, aliases, await inputs, tool variables.
    Plain(Value),

    /// A step output bound under the step's own name. Displays as the inner
    /// value; exposes a `value` member; falls back to the inner mapping's
    /// keys for other members.
    StepOutput(Value),
}

impl VarValue {
    /// The underlying value, ignoring the wrapping.
    pub fn raw(&self) -> &Value {
        match self {
            Self::Plain(v) | Self::StepOutput(v) => v,
        }
    }

    /// Consume the binding, returning the underlying value.
    pub fn into_raw(self) -> Value {
        match self {
            Self::Plain(v) | Self::StepOutput(v) => v,
        }
    }
}

impl From<Value> for VarValue {
    fn from(v: Value) -> Self {
        Self::Plain(v)
    }
}

/// Renders a value the way it appears at a template substitution site.
///
/// Strings are inserted verbatim, `null` renders empty, numbers follow the
/// integral-formatting rule, and composite values render as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Formats a JSON number, dropping the decimal point when the value is
/// integral.
pub fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Builds a JSON number from an arithmetic result, preferring the integer
/// representation when the value is integral.
pub fn number_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

// Largest magnitude exactly representable as both f64 and i64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Extracts a numeric operand, if the value is a number.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_scalar_values() {
        assert_eq!(display_value(&json!("text")), "text");
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(2.5)), "2.5");
    }

    #[test]
    fn display_integral_float_without_decimal_point() {
        assert_eq!(display_value(&json!(20.0)), "20");
    }

    #[test]
    fn display_composite_as_json() {
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
        assert_eq!(display_value(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn number_value_prefers_integers() {
        assert_eq!(number_value(6.0), json!(6));
        assert_eq!(number_value(6.5), json!(6.5));
    }

    #[test]
    fn var_value_raw_ignores_wrapping() {
        let wrapped = VarValue::StepOutput(json!("out"));
        assert_eq!(wrapped.raw(), &json!("out"));
        assert_eq!(wrapped.into_raw(), json!("out"));
    }
}
