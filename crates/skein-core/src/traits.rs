//! Capability traits the engine consumes.
//!
//! Concrete language-model providers, tools, skill storage and execution
//! stores live outside the core; these traits are the seams they plug into.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::skill::SkillSummary;
use crate::snapshot::{ExecutionSnapshot, SnapshotStatus};
use crate::tool::ToolDefinition;

/// A language-model adapter, as consumed by PROMPT steps.
///
/// Adapters resolve their credentials themselves, conventionally in this
/// order: constructor-injected override, then process environment, then
/// none — in which case [`is_available`](LlmAdapter::is_available) returns
/// false and the engine fails the step without calling out.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// The adapter name, for registries and logs.
    fn name(&self) -> &str;

    /// Whether the adapter is usable (credentials resolved, endpoint known).
    fn is_available(&self) -> bool {
        true
    }

    /// Sends a rendered prompt and returns the completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// The output capability handed to tools during execution.
///
/// Tools do not return a value; they write named variables straight into
/// the execution context, where they override same-named step outputs.
pub trait ToolOutput: Send {
    /// Writes one named variable.
    fn put(&mut self, name: &str, value: Value);
}

/// An executable tool, as consumed by TOOL steps.
#[async_trait]
pub trait SkillTool: Send + Sync {
    /// The tool definition: name and accepted parameters.
    fn definition(&self) -> &ToolDefinition;

    /// The tool name.
    fn name(&self) -> &str {
        &self.definition().name
    }

    /// Validates a rendered input mapping before execution.
    fn validate_input(&self, input: &Value) -> Result<()> {
        self.definition().validate_args(input)
    }

    /// Executes the tool, writing outputs through the capability.
    async fn execute(&self, input: Value, output: &mut dyn ToolOutput) -> Result<()>;
}

/// Storage of skill source documents.
#[async_trait]
pub trait SkillRepository: Send + Sync {
    /// Lists the available skills.
    async fn list(&self) -> Result<Vec<SkillSummary>>;

    /// Loads one skill's Markdown source by id, optionally pinned to a
    /// version. `None` when the id is unknown.
    async fn load(&self, id: &str, version: Option<&str>) -> Result<Option<String>>;
}

/// Storage of paused executions.
///
/// Implementations must guarantee that no two
/// [`try_transition`](ExecutionStore::try_transition) calls for the same id
/// can both observe the `from` status: ACTIVE → RESUMED is the transition
/// the at-most-one-resume invariant rides on.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persists a snapshot, replacing any snapshot with the same id.
    async fn save(&self, snapshot: ExecutionSnapshot) -> Result<()>;

    /// Looks a snapshot up by execution id, applying TTL expiry.
    async fn find_by_id(&self, execution_id: &str) -> Result<Option<ExecutionSnapshot>>;

    /// Atomically transitions a snapshot's status. Returns true iff the
    /// snapshot existed with effective status `from` and was moved to `to`.
    async fn try_transition(
        &self,
        execution_id: &str,
        from: SnapshotStatus,
        to: SnapshotStatus,
    ) -> Result<bool>;

    /// Removes a snapshot, returning it when it existed.
    async fn delete(&self, execution_id: &str) -> Result<Option<ExecutionSnapshot>>;

    /// Drops snapshots past their TTL; returns how many were removed.
    async fn sweep_expired(&self) -> Result<usize>;
}
