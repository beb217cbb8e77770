//! `StepError`: a distinct type from [`corecache_core::CommandError`] because
//! a step's failure carries the step's name and how it failed, which a
//! command-level error has no place for.

use thiserror::Error;

use corecache_core::CommandError;

#[derive(Debug, Clone, Error)]
pub enum StepError {
    #[error("step {step:?} failed: {source}")]
    Command { step: String, source: CommandError },

    #[error("step {step:?} timed out after {timeout_ms}ms")]
    TimedOut { step: String, timeout_ms: u64 },

    #[error("step {step:?} was skipped: dependency {dependency:?} failed or was skipped")]
    Skipped { step: String, dependency: String },
}

impl StepError {
    pub fn step_name(&self) -> &str {
        match self {
            StepError::Command { step, .. } => step,
            StepError::TimedOut { step, .. } => step,
            StepError::Skipped { step, .. } => step,
        }
    }
}
