//! # skein-core
//!
//! Core types and capability traits for skein.
//!
//! This crate defines the skill descriptor and its vocabulary (fields,
//! steps, results), the per-execution context, the durable snapshot of a
//! paused execution, and the traits through which the engine reaches
//! language models, tools, skill storage and the execution store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod error;
mod field;
mod result;
mod skill;
mod snapshot;
mod step;
mod tool;
mod traits;

pub use context::{AwaitInput, ExecutionContext};
pub use error::{Error, Result};
pub use field::{find_field, json_type_name, FieldSpec, FieldType, ValidationRule};
pub use result::{AwaitRequest, SkillResult, SkillStatus, StepResult};
pub use skill::{Reference, ReferenceKind, Skill, SkillSummary};
pub use snapshot::{ExecutionSnapshot, SnapshotStatus};
pub use step::{
    AwaitStepConfig, PromptStepConfig, Step, StepConfig, StepKind, StepStatus, TemplateStepConfig,
    ToolStepConfig,
};
pub use tool::ToolDefinition;
pub use traits::{ExecutionStore, LlmAdapter, SkillRepository, SkillTool, ToolOutput};
