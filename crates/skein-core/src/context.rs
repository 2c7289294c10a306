//! The per-execution variable store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_expr::{VarMap, VarValue};

use crate::result::StepResult;
use crate::traits::ToolOutput;

/// Input supplied by the caller for one AWAIT step, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwaitInput {
    /// Name of the await step that requested it.
    pub step_name: String,
    /// The supplied values.
    pub values: HashMap<String, Value>,
}

/// Mutable state of one in-flight execution: the caller's inputs, step
/// results in order, await inputs, tool-written variables and metadata.
///
/// A context is owned by exactly one execution at a time. On suspension the
/// engine hands it to the store inside a snapshot; on resume the store hands
/// it back. Aliases are not serialised — the engine re-registers them when
/// it reconstitutes an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    execution_id: String,
    input: HashMap<String, Value>,
    step_results: Vec<StepResult>,
    await_inputs: Vec<AwaitInput>,
    tool_variables: HashMap<String, Value>,
    metadata: HashMap<String, Value>,
    started_at: DateTime<Utc>,
    #[serde(skip)]
    var_aliases: HashMap<String, String>,
}

impl ExecutionContext {
    /// Creates a fresh context for one execution.
    pub fn new(execution_id: impl Into<String>, input: HashMap<String, Value>) -> Self {
        Self {
            execution_id: execution_id.into(),
            input,
            step_results: Vec::new(),
            await_inputs: Vec::new(),
            tool_variables: HashMap::new(),
            metadata: HashMap::new(),
            started_at: Utc::now(),
            var_aliases: HashMap::new(),
        }
    }

    /// Reconstitutes a context equivalent to the state at suspension.
    pub fn for_resume(
        input: HashMap<String, Value>,
        step_results: Vec<StepResult>,
        await_inputs: Vec<AwaitInput>,
        execution_id: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            input,
            step_results,
            await_inputs,
            tool_variables: HashMap::new(),
            metadata: HashMap::new(),
            started_at: Utc::now(),
            var_aliases: HashMap::new(),
        }
    }

    /// The execution id; preserved across pause and resume.
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// When this execution started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Milliseconds elapsed since the execution started.
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    /// The caller-supplied inputs.
    pub fn input(&self) -> &HashMap<String, Value> {
        &self.input
    }

    /// Looks an input value up by key.
    pub fn input_value(&self, key: &str) -> Option<&Value> {
        self.input.get(key)
    }

    /// Looks an input value up, falling back to a default.
    pub fn input_value_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.input.get(key).unwrap_or(default)
    }

    /// Inserts an input value; used when schema defaults are applied.
    pub fn set_input(&mut self, key: impl Into<String>, value: Value) {
        self.input.insert(key.into(), value);
    }

    /// Appends a step result, preserving order.
    pub fn add_step_result(&mut self, result: StepResult) {
        self.step_results.push(result);
    }

    /// All step results recorded so far, in order.
    pub fn step_results(&self) -> &[StepResult] {
        &self.step_results
    }

    /// The output of a step, iff its latest record is SUCCESS.
    pub fn step_output(&self, name: &str) -> Option<&Value> {
        self.step_results
            .iter()
            .rev()
            .find(|r| r.step_name == name)
            .filter(|r| r.is_success())
            .and_then(|r| r.output.as_ref())
    }

    /// Records an alias for a step's output. The engine calls this before
    /// executing any non-TOOL step that declares a `varName`.
    pub fn register_var_alias(&mut self, step_name: impl Into<String>, alias: impl Into<String>) {
        self.var_aliases.insert(step_name.into(), alias.into());
    }

    /// Injects the caller's answer for an await step on resume. A repeated
    /// answer for the same step replaces the earlier one.
    pub fn add_await_input(&mut self, step_name: impl Into<String>, values: HashMap<String, Value>) {
        let step_name = step_name.into();
        self.await_inputs.retain(|a| a.step_name != step_name);
        self.await_inputs.push(AwaitInput { step_name, values });
    }

    /// The await inputs received so far, in arrival order.
    pub fn await_inputs(&self) -> &[AwaitInput] {
        &self.await_inputs
    }

    /// Sets a metadata entry, surfaced under `context.*`.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Variables written directly by tools.
    pub fn tool_variables(&self) -> &HashMap<String, Value> {
        &self.tool_variables
    }

    /// Assembles the variable view the evaluators resolve against.
    ///
    /// Layering, later layers winning: inputs, flattened await inputs,
    /// successful step outputs (wrapped under the step name, raw under the
    /// alias when one is declared), tool-written variables, and a `context`
    /// sub-mapping with `start_time`, `elapsed` and user metadata.
    pub fn build_variable_view(&self) -> VarMap {
        let mut view = VarMap::new();

        for (key, value) in &self.input {
            view.insert(key.clone(), VarValue::Plain(value.clone()));
        }

        for await_input in &self.await_inputs {
            for (key, value) in &await_input.values {
                view.insert(key.clone(), VarValue::Plain(value.clone()));
            }
        }

        for result in &self.step_results {
            if !result.is_success() {
                continue;
            }
            let output = result.output.clone().unwrap_or(Value::Null);
            if let Some(alias) = self.var_aliases.get(&result.step_name) {
                view.insert(alias.clone(), VarValue::Plain(output.clone()));
            }
            view.insert(result.step_name.clone(), VarValue::StepOutput(output));
        }

        for (key, value) in &self.tool_variables {
            view.insert(key.clone(), VarValue::Plain(value.clone()));
        }

        let mut context_map = serde_json::Map::new();
        for (key, value) in &self.metadata {
            context_map.insert(key.clone(), value.clone());
        }
        context_map.insert(
            "start_time".to_string(),
            Value::String(self.started_at.to_rfc3339()),
        );
        context_map.insert("elapsed".to_string(), Value::from(self.elapsed_ms()));
        view.insert(
            "context".to_string(),
            VarValue::Plain(Value::Object(context_map)),
        );

        view
    }
}

impl ToolOutput for ExecutionContext {
    /// Tools write named outputs straight into the variable store; they
    /// override same-named step outputs in the view.
    fn put(&mut self, name: &str, value: Value) {
        self.tool_variables.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skein_expr::render;

    fn inputs(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn inputs_are_visible_in_the_view() {
        let ctx = ExecutionContext::new("e-1", inputs(&[("name", json!("Ada"))]));
        let view = ctx.build_variable_view();
        assert_eq!(render("Hi {{name}}", &view).unwrap(), "Hi Ada");
    }

    #[test]
    fn step_outputs_bind_wrapped_and_aliases_bind_raw() {
        let mut ctx = ExecutionContext::new("e-1", HashMap::new());
        ctx.add_step_result(StepResult::success("greet", Some(json!("Hello!")), 1));
        ctx.register_var_alias("greet", "greeting");

        // The aliased output is visible raw under the alias and wrapped
        // under the step name.
        let view = ctx.build_variable_view();
        assert_eq!(render("{{greeting}}", &view).unwrap(), "Hello!");
        assert_eq!(render("{{greet}}", &view).unwrap(), "Hello!");
        assert_eq!(render("{{greet.value}}", &view).unwrap(), "Hello!");
    }

    #[test]
    fn failed_step_outputs_are_not_bound() {
        let mut ctx = ExecutionContext::new("e-1", HashMap::new());
        ctx.add_step_result(StepResult::failure("broken", "boom", 1));

        assert!(ctx.step_output("broken").is_none());
        let view = ctx.build_variable_view();
        assert_eq!(render("[{{broken}}]", &view).unwrap(), "[]");
    }

    #[test]
    fn later_record_for_a_step_wins() {
        // A resumed await step keeps its AWAITING record and gains a
        // synthetic SUCCESS record.
        let mut ctx = ExecutionContext::new("e-1", HashMap::new());
        ctx.add_step_result(StepResult {
            step_name: "confirm".to_string(),
            status: crate::StepStatus::Awaiting,
            output: None,
            error: None,
            duration_ms: 0,
        });
        ctx.add_step_result(StepResult::success(
            "confirm",
            Some(json!({"approved": true})),
            0,
        ));

        assert_eq!(ctx.step_output("confirm"), Some(&json!({"approved": true})));
        let view = ctx.build_variable_view();
        assert_eq!(render("{{confirm.approved}}", &view).unwrap(), "true");
    }

    #[test]
    fn await_inputs_flatten_and_later_awaits_win() {
        let mut ctx = ExecutionContext::new("e-1", inputs(&[("mode", json!("initial"))]));
        ctx.add_await_input("first", inputs(&[("mode", json!("confirmed"))]));

        let view = ctx.build_variable_view();
        assert_eq!(render("{{mode}}", &view).unwrap(), "confirmed");
    }

    #[test]
    fn tool_variables_override_step_outputs() {
        let mut ctx = ExecutionContext::new("e-1", HashMap::new());
        ctx.add_step_result(StepResult::success("fetch", Some(json!("from step")), 1));
        ctx.put("fetch", json!("from tool"));

        let view = ctx.build_variable_view();
        assert_eq!(render("{{fetch}}", &view).unwrap(), "from tool");
    }

    #[test]
    fn context_mapping_carries_runtime_info_and_metadata() {
        let mut ctx = ExecutionContext::new("e-1", HashMap::new());
        ctx.set_metadata("caller", json!("cli"));

        let view = ctx.build_variable_view();
        assert_eq!(render("{{context.caller}}", &view).unwrap(), "cli");
        assert!(!render("{{context.start_time}}", &view).unwrap().is_empty());
    }

    #[test]
    fn serde_round_trip_drops_aliases() {
        let mut ctx = ExecutionContext::new("e-1", inputs(&[("x", json!("go"))]));
        ctx.add_step_result(StepResult::success("phase1", Some(json!("go")), 2));
        ctx.register_var_alias("phase1", "p1");

        let json = serde_json::to_string(&ctx).unwrap();
        let back: ExecutionContext = serde_json::from_str(&json).unwrap();

        assert_eq!(back.execution_id(), "e-1");
        assert_eq!(back.step_results().len(), 1);
        // Aliases are engine state, re-registered on resume.
        let view = back.build_variable_view();
        assert_eq!(render("[{{p1}}]", &view).unwrap(), "[]");
        assert_eq!(render("[{{phase1}}]", &view).unwrap(), "[go]");
    }
}
