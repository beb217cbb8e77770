//! corecache-actions — the Action Engine: a fluent step builder
//! with build-time graph validation, Kahn-batched execution over a
//! [`corecache_facade::CacheFacade`], per-step retry and timeout, the three
//! failure strategies, and best-effort reverse-order rollback.

mod batch;
mod builder;
mod error;
mod run;
mod step;

pub use builder::ActionBuilder;
pub use error::StepError;
pub use run::{Action, ActionResult};
pub use step::{ResolvedDeps, StepInput};
