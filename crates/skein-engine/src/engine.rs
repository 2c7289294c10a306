//! The skill execution engine: step sequencing, suspension and resume.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use skein_core::{
    AwaitRequest, ExecutionContext, ExecutionSnapshot, ExecutionStore, Skill, SkillResult,
    SnapshotStatus, Step, StepConfig, StepKind, StepResult, StepStatus,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::executors::{
    AwaitStepExecutor, PromptStepExecutor, StepExecutor, TemplateStepExecutor, ToolStepExecutor,
};
use crate::listener::{ExecutionListener, NoOpListener};
use crate::output::{assemble_output, validate_output};
use crate::registry::{LlmRegistry, ToolRegistry};

/// Sequences a skill's steps over one execution context.
///
/// One engine serves any number of concurrent executions: the skill, the
/// registries and the store are shared read-mostly state, while each
/// execution owns its context. Suspension is explicit — an AWAIT step
/// yields, the engine snapshots the context into the store and returns a
/// waiting result; [`resume`](SkillEngine::resume) reconstitutes the
/// context and continues at the next step.
pub struct SkillEngine {
    tools: Arc<ToolRegistry>,
    llms: Arc<LlmRegistry>,
    store: Arc<dyn ExecutionStore>,
    listener: Arc<dyn ExecutionListener>,
    snapshot_ttl: chrono::Duration,
    tool_executor: ToolStepExecutor,
    prompt_executor: PromptStepExecutor,
    template_executor: TemplateStepExecutor,
    await_executor: AwaitStepExecutor,
}

impl SkillEngine {
    /// Creates an engine over the given registries and execution store.
    pub fn new(
        tools: Arc<ToolRegistry>,
        llms: Arc<LlmRegistry>,
        store: Arc<dyn ExecutionStore>,
    ) -> Self {
        Self {
            tool_executor: ToolStepExecutor::new(tools.clone()),
            prompt_executor: PromptStepExecutor::new(llms.clone()),
            template_executor: TemplateStepExecutor,
            await_executor: AwaitStepExecutor,
            tools,
            llms,
            store,
            listener: Arc::new(NoOpListener),
            snapshot_ttl: chrono::Duration::hours(24),
        }
    }

    /// Overrides the TTL of snapshots taken at suspension points.
    pub fn with_snapshot_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.snapshot_ttl = ttl;
        self
    }

    /// Installs a lifecycle listener.
    pub fn set_listener(&mut self, listener: Arc<dyn ExecutionListener>) {
        self.listener = listener;
    }

    /// The tool registry this engine dispatches TOOL steps against.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The adapter registry this engine dispatches PROMPT steps against.
    pub fn llms(&self) -> &Arc<LlmRegistry> {
        &self.llms
    }

    /// Executes a skill from the first step.
    pub async fn execute(
        &self,
        skill: &Skill,
        inputs: HashMap<String, Value>,
    ) -> Result<SkillResult, EngineError> {
        skill
            .validate()
            .map_err(|e| EngineError::InvalidSkill(e.to_string()))?;

        let execution_id = Uuid::new_v4().to_string();
        let mut context = ExecutionContext::new(&execution_id, inputs);
        apply_input_defaults(skill, &mut context);

        info!(skill_id = %skill.id, execution_id = %execution_id, "executing skill");
        let started = Instant::now();
        self.listener.on_skill_start(skill, &context);
        let result = self.run_from(skill, &mut context, 0, started).await?;
        self.listener.on_skill_complete(skill, &result);
        Ok(result)
    }

    /// Resumes a paused execution with the caller's await input.
    ///
    /// Fails with [`EngineError::ExecutionNotFound`] when no snapshot
    /// exists, [`EngineError::ExecutionAlreadyCompleted`] when the snapshot
    /// is not ACTIVE, and [`EngineError::InputValidation`] when the input
    /// violates the await schema — in which case the snapshot stays ACTIVE
    /// so the caller can retry.
    pub async fn resume(
        &self,
        skill: &Skill,
        execution_id: &str,
        inputs: HashMap<String, Value>,
    ) -> Result<SkillResult, EngineError> {
        skill
            .validate()
            .map_err(|e| EngineError::InvalidSkill(e.to_string()))?;

        let snapshot = self
            .store
            .find_by_id(execution_id)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))?;

        if snapshot.effective_status(Utc::now()) != SnapshotStatus::Active {
            return Err(EngineError::ExecutionAlreadyCompleted(
                execution_id.to_string(),
            ));
        }

        let messages = validate_await_input(&snapshot.await_request, &inputs);
        if !messages.is_empty() {
            return Err(EngineError::InputValidation { messages });
        }

        // The critical transition: whoever wins the compare-and-set owns
        // the execution; everyone else sees a non-ACTIVE snapshot.
        let won = self
            .store
            .try_transition(execution_id, SnapshotStatus::Active, SnapshotStatus::Resumed)
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        if !won {
            return Err(EngineError::ExecutionAlreadyCompleted(
                execution_id.to_string(),
            ));
        }

        let index = snapshot.current_step_index;
        if index >= skill.steps.len() {
            return Err(EngineError::Internal(format!(
                "snapshot step index {index} out of range for skill '{}'",
                skill.id
            )));
        }
        if snapshot.skill_id != skill.id {
            warn!(
                snapshot_skill = %snapshot.skill_id,
                given_skill = %skill.id,
                "resuming with a different skill id than the snapshot was taken from"
            );
        }

        let mut context = snapshot.context;
        // Alias registrations are not persisted; re-register them for every
        // step up to and including the suspension point.
        for step in &skill.steps[..=index] {
            if step.kind() != StepKind::Tool {
                if let Some(alias) = &step.var_name {
                    context.register_var_alias(&step.name, alias);
                }
            }
        }

        let step_name = skill.steps[index].name.clone();
        context.add_await_input(&step_name, inputs.clone());
        // A synthetic SUCCESS record makes `{{await_step.field}}` and
        // aliases work the same as any other step output.
        let input_value = Value::Object(inputs.into_iter().collect());
        context.add_step_result(StepResult::success(&step_name, Some(input_value), 0));

        info!(skill_id = %skill.id, execution_id = %execution_id, resume_index = index + 1, "resuming skill");
        let started = Instant::now();
        self.listener.on_skill_start(skill, &context);
        let result = self.run_from(skill, &mut context, index + 1, started).await?;
        self.listener.on_skill_complete(skill, &result);
        Ok(result)
    }

    /// Cancels a paused execution; later resumes fail with
    /// `ExecutionAlreadyCompleted`.
    pub async fn cancel(&self, execution_id: &str) -> Result<bool, EngineError> {
        self.store
            .try_transition(
                execution_id,
                SnapshotStatus::Active,
                SnapshotStatus::Cancelled,
            )
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))
    }

    /// The forward pass over `skill.steps[start..]`.
    async fn run_from(
        &self,
        skill: &Skill,
        context: &mut ExecutionContext,
        start: usize,
        started: Instant,
    ) -> Result<SkillResult, EngineError> {
        let total = skill.steps.len();

        for index in start..total {
            let step = &skill.steps[index];

            if step.kind() != StepKind::Tool {
                if let Some(alias) = &step.var_name {
                    context.register_var_alias(&step.name, alias);
                }
            }

            self.listener.on_step_start(step, index, total);

            if let Some(when) = &step.when {
                let view = context.build_variable_view();
                if !when.evaluate(&view) {
                    debug!(step = %step.name, guard = %when.raw, "step skipped by guard");
                    let result = StepResult::skipped(&step.name);
                    context.add_step_result(result.clone());
                    self.listener.on_step_complete(step, &result, index, total);
                    continue;
                }
            }

            let result = self
                .executor_for(step.kind())
                .execute(step, context)
                .await?;
            context.add_step_result(result.clone());
            self.listener.on_step_complete(step, &result, index, total);

            match result.status {
                StepStatus::Success | StepStatus::Skipped => {}
                StepStatus::Awaiting => {
                    let request = await_request_for(step)?;
                    let snapshot = ExecutionSnapshot::create_active(
                        context.clone(),
                        &skill.id,
                        skill.version.clone(),
                        index,
                        request.clone(),
                        self.snapshot_ttl,
                    );
                    self.store
                        .save(snapshot)
                        .await
                        .map_err(|e| EngineError::Internal(e.to_string()))?;
                    info!(
                        skill_id = %skill.id,
                        execution_id = %context.execution_id(),
                        step = %step.name,
                        "execution suspended, waiting for input"
                    );
                    return Ok(SkillResult::awaiting(
                        context.execution_id(),
                        request,
                        context.step_results().to_vec(),
                        started.elapsed().as_millis() as u64,
                    ));
                }
                StepStatus::Failed => {
                    for later in &skill.steps[index + 1..] {
                        context.add_step_result(StepResult::skipped(&later.name));
                    }
                    let message = format!(
                        "step '{}' failed: {}",
                        step.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    warn!(skill_id = %skill.id, execution_id = %context.execution_id(), %message);
                    return Ok(SkillResult::failure(
                        context.execution_id(),
                        message,
                        context.step_results().to_vec(),
                        started.elapsed().as_millis() as u64,
                    ));
                }
                StepStatus::Pending | StepStatus::Running => {
                    return Err(EngineError::Internal(format!(
                        "executor returned non-terminal status for step '{}'",
                        step.name
                    )));
                }
            }
        }

        let view = context.build_variable_view();
        let output = assemble_output(&view, &skill.output_contract);
        if let Some(message) = validate_output(&output, &skill.output_contract) {
            return Ok(SkillResult::failure(
                context.execution_id(),
                message,
                context.step_results().to_vec(),
                started.elapsed().as_millis() as u64,
            ));
        }

        info!(skill_id = %skill.id, execution_id = %context.execution_id(), "skill completed");
        Ok(SkillResult::success(
            context.execution_id(),
            output,
            context.step_results().to_vec(),
            started.elapsed().as_millis() as u64,
        ))
    }

    fn executor_for(&self, kind: StepKind) -> &dyn StepExecutor {
        match kind {
            StepKind::Tool => &self.tool_executor,
            StepKind::Prompt => &self.prompt_executor,
            StepKind::Template => &self.template_executor,
            StepKind::Await => &self.await_executor,
        }
    }
}

/// Applies schema defaults for inputs the caller left out.
fn apply_input_defaults(skill: &Skill, context: &mut ExecutionContext) {
    for field in &skill.input_schema {
        if context.input_value(&field.name).is_none() {
            if let Some(default) = &field.default_value {
                context.set_input(&field.name, default.clone());
            }
        }
    }
}

/// Checks an await answer against the request's schema: required fields
/// present, provided fields coarsely typed.
fn validate_await_input(request: &AwaitRequest, inputs: &HashMap<String, Value>) -> Vec<String> {
    let mut messages = Vec::new();
    for field in &request.input_schema {
        match inputs.get(&field.name).filter(|v| !v.is_null()) {
            None => {
                if field.required {
                    messages.push(format!("field '{}' is required", field.name));
                }
            }
            Some(value) => {
                if !field.field_type.matches(value) {
                    messages.push(format!(
                        "field '{}' must be {}",
                        field.name,
                        field.field_type.as_str()
                    ));
                }
            }
        }
    }
    messages
}

fn await_request_for(step: &Step) -> Result<AwaitRequest, EngineError> {
    match &step.config {
        StepConfig::Await(config) => Ok(AwaitRequest::from(config)),
        _ => Err(EngineError::Internal(format!(
            "step '{}' yielded AWAITING without an await config",
            step.name
        ))),
    }
}
