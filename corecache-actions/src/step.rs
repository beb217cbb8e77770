//! Step definitions: `operation`, `compute`, `fanOut`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use corecache_adapter::PipelineEntry;
use corecache_core::{CommandError, OperationDescriptor};
use corecache_facade::CacheFacade;

/// The action's external input, threaded unchanged into every step.
pub type StepInput = serde_json::Value;

/// Results of already-completed dependencies, keyed by step name.
pub type ResolvedDeps = HashMap<String, serde_json::Value>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type ParamsFn = Arc<dyn Fn(&StepInput, &ResolvedDeps) -> serde_json::Value + Send + Sync>;
type ComputeFn =
    Arc<dyn Fn(StepInput, ResolvedDeps, CacheFacade) -> BoxFuture<'static, Result<serde_json::Value, CommandError>> + Send + Sync>;
type FanOutFn = Arc<dyn Fn(&StepInput, &ResolvedDeps) -> Vec<PipelineEntry> + Send + Sync>;
type ReduceFn = Arc<dyn Fn(Vec<corecache_core::RawValue>) -> serde_json::Value + Send + Sync>;
pub type UndoFn =
    Arc<dyn Fn(StepInput, serde_json::Value, CacheFacade) -> BoxFuture<'static, Result<(), CommandError>> + Send + Sync>;

pub enum StepKind {
    Operation { descriptor: OperationDescriptor, params: ParamsFn },
    Compute { compute: ComputeFn },
    FanOut { generate: FanOutFn, reduce: Option<ReduceFn> },
}

pub struct Step {
    pub name: String,
    pub depends_on: Vec<String>,
    pub kind: StepKind,
    pub retries: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub undo: Option<UndoFn>,
}
