//! Execution lifecycle listener.

use skein_core::{ExecutionContext, Skill, SkillResult, Step, StepResult};

/// Observer of execution lifecycle events.
///
/// All methods default to no-ops; implement the ones you care about.
/// Implementations must be `Send + Sync` — one listener may observe many
/// concurrent executions.
pub trait ExecutionListener: Send + Sync {
    /// Called when an execute or resume call starts stepping.
    fn on_skill_start(&self, _skill: &Skill, _context: &ExecutionContext) {}

    /// Called when an execute or resume call returns, with its result.
    fn on_skill_complete(&self, _skill: &Skill, _result: &SkillResult) {}

    /// Called before each step, with the step's index and the step count.
    fn on_step_start(&self, _step: &Step, _index: usize, _total: usize) {}

    /// Called after each step, with its result.
    fn on_step_complete(&self, _step: &Step, _result: &StepResult, _index: usize, _total: usize) {}
}

/// A listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

impl ExecutionListener for NoOpListener {}
