//! One executor per step kind.
//!
//! Executors share one contract: consume a step plus the execution context
//! and produce a terminal [`StepResult`]. A recoverable problem (missing
//! tool, template error, empty model response) comes back as a FAILED
//! result; only structural misuse — a step dispatched to the wrong
//! executor — is an `Err`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use skein_core::{AwaitRequest, ExecutionContext, Step, StepConfig, StepResult};
use skein_expr::{render, render_structure};
use tracing::debug;

use crate::error::EngineError;
use crate::registry::{LlmRegistry, ToolRegistry};

/// Shared contract of the four step executors.
#[async_trait]
pub(crate) trait StepExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
    ) -> Result<StepResult, EngineError>;
}

fn misdispatch(step: &Step, expected: &str) -> EngineError {
    EngineError::Internal(format!(
        "step '{}' dispatched to the {expected} executor with a {} config",
        step.name,
        step.kind()
    ))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Executes TOOL steps: renders the input template, validates it against
/// the tool, then lets the tool write variables through the context.
pub(crate) struct ToolStepExecutor {
    tools: Arc<ToolRegistry>,
}

impl ToolStepExecutor {
    pub(crate) fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl StepExecutor for ToolStepExecutor {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
    ) -> Result<StepResult, EngineError> {
        let StepConfig::Tool(config) = &step.config else {
            return Err(misdispatch(step, "tool"));
        };
        let start = Instant::now();

        let Some(tool) = self.tools.get(&config.tool_name).await else {
            return Ok(StepResult::failure(
                &step.name,
                format!("tool not found: {}", config.tool_name),
                elapsed_ms(start),
            ));
        };

        let view = context.build_variable_view();
        let rendered = match render_structure(&config.input_template, &view) {
            Ok(value) => reparse_json_leaves(value),
            Err(e) => {
                return Ok(StepResult::failure(
                    &step.name,
                    format!("template error: {e}"),
                    elapsed_ms(start),
                ))
            }
        };

        if let Err(e) = tool.validate_input(&rendered) {
            return Ok(StepResult::failure(
                &step.name,
                format!("invalid input for tool '{}': {e}", config.tool_name),
                elapsed_ms(start),
            ));
        }

        debug!(step = %step.name, tool = %config.tool_name, "invoking tool");
        match tool.execute(rendered, context).await {
            // Tool outputs live in the context, not in the step record.
            Ok(()) => Ok(StepResult::success(&step.name, None, elapsed_ms(start))),
            Err(e) => Ok(StepResult::failure(
                &step.name,
                e.to_string(),
                elapsed_ms(start),
            )),
        }
    }
}

/// A rendered leaf that reads as JSON becomes structure again, so tools
/// receive arrays and mappings rather than their serialised forms.
fn reparse_json_leaves(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(parsed) => parsed,
                    Err(_) => Value::String(s),
                }
            } else {
                Value::String(s)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(reparse_json_leaves).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, reparse_json_leaves(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Executes PROMPT steps through the default language-model adapter.
pub(crate) struct PromptStepExecutor {
    llms: Arc<LlmRegistry>,
}

impl PromptStepExecutor {
    pub(crate) fn new(llms: Arc<LlmRegistry>) -> Self {
        Self { llms }
    }
}

#[async_trait]
impl StepExecutor for PromptStepExecutor {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
    ) -> Result<StepResult, EngineError> {
        let StepConfig::Prompt(config) = &step.config else {
            return Err(misdispatch(step, "prompt"));
        };
        let start = Instant::now();

        let view = context.build_variable_view();
        let prompt = match render(&config.template, &view) {
            Ok(prompt) => prompt,
            Err(e) => {
                return Ok(StepResult::failure(
                    &step.name,
                    format!("template error: {e}"),
                    elapsed_ms(start),
                ))
            }
        };

        let Some(adapter) = self.llms.default_adapter().await else {
            return Ok(StepResult::failure(
                &step.name,
                "no language-model adapter configured",
                elapsed_ms(start),
            ));
        };
        if !adapter.is_available() {
            return Ok(StepResult::failure(
                &step.name,
                format!("adapter '{}' is unavailable", adapter.name()),
                elapsed_ms(start),
            ));
        }

        debug!(step = %step.name, adapter = %adapter.name(), "invoking language model");
        match adapter.complete(&prompt).await {
            Ok(response) if response.trim().is_empty() => Ok(StepResult::failure(
                &step.name,
                "empty response from language model",
                elapsed_ms(start),
            )),
            Ok(response) => Ok(StepResult::success(
                &step.name,
                Some(Value::String(response)),
                elapsed_ms(start),
            )),
            Err(e) => Ok(StepResult::failure(
                &step.name,
                e.to_string(),
                elapsed_ms(start),
            )),
        }
    }
}

/// Executes TEMPLATE steps: pure rendering, no side effects.
pub(crate) struct TemplateStepExecutor;

#[async_trait]
impl StepExecutor for TemplateStepExecutor {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ExecutionContext,
    ) -> Result<StepResult, EngineError> {
        let StepConfig::Template(config) = &step.config else {
            return Err(misdispatch(step, "template"));
        };
        let start = Instant::now();

        let view = context.build_variable_view();
        match render(&config.template, &view) {
            Ok(rendered) => Ok(StepResult::success(
                &step.name,
                Some(Value::String(rendered)),
                elapsed_ms(start),
            )),
            Err(e) => Ok(StepResult::failure(
                &step.name,
                format!("template error: {e}"),
                elapsed_ms(start),
            )),
        }
    }
}

/// Executes AWAIT steps by yielding an AWAITING result; the engine
/// interprets it and suspends the execution.
pub(crate) struct AwaitStepExecutor;

#[async_trait]
impl StepExecutor for AwaitStepExecutor {
    async fn execute(
        &self,
        step: &Step,
        _context: &mut ExecutionContext,
    ) -> Result<StepResult, EngineError> {
        let StepConfig::Await(config) = &step.config else {
            return Err(misdispatch(step, "await"));
        };
        let start = Instant::now();
        let request = AwaitRequest::from(config);
        Ok(StepResult::awaiting(&step.name, &request, elapsed_ms(start)))
    }
}
