//! Fluent step builder.

use std::sync::Arc;

use corecache_adapter::PipelineEntry;
use corecache_core::{ConfigError, OperationDescriptor, RawValue};
use corecache_facade::CacheFacade;

use crate::batch::validate_and_batch;
use crate::run::Action;
use crate::step::{BoxFuture, ResolvedDeps, Step, StepInput, StepKind, UndoFn};

pub struct ActionBuilder {
    steps: Vec<Step>,
}

impl Default for ActionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionBuilder {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Add an `operation` step: a single operation descriptor whose
    /// parameters are derived from `(input, resolvedDeps)`.
    pub fn operation(
        mut self,
        name: impl Into<String>,
        depends_on: &[&str],
        descriptor: OperationDescriptor,
        params: impl Fn(&StepInput, &ResolvedDeps) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.steps.push(Step {
            name: name.into(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            kind: StepKind::Operation { descriptor, params: Arc::new(params) },
            retries: None,
            timeout_ms: None,
            undo: None,
        });
        self
    }

    /// Add a `compute` step: arbitrary asynchronous work with access to
    /// `(input, resolvedDeps, facade)`.
    pub fn compute<F>(
        mut self,
        name: impl Into<String>,
        depends_on: &[&str],
        compute: impl Fn(StepInput, ResolvedDeps, CacheFacade) -> F + Send + Sync + 'static,
    ) -> Self
    where
        F: std::future::Future<Output = Result<serde_json::Value, corecache_core::CommandError>> + Send + 'static,
    {
        self.steps.push(Step {
            name: name.into(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            kind: StepKind::Compute { compute: Arc::new(move |input, deps, facade| -> BoxFuture<'static, _> { Box::pin(compute(input, deps, facade)) }) },
            retries: None,
            timeout_ms: None,
            undo: None,
        });
        self
    }

    /// Add a `fanOut` step: generates N pipeline entries from
    /// `(input, resolvedDeps)`, submits them as one pipeline, and optionally
    /// reduces the raw-result array.
    pub fn fan_out(
        mut self,
        name: impl Into<String>,
        depends_on: &[&str],
        generate: impl Fn(&StepInput, &ResolvedDeps) -> Vec<PipelineEntry> + Send + Sync + 'static,
        reduce: Option<impl Fn(Vec<RawValue>) -> serde_json::Value + Send + Sync + 'static>,
    ) -> Self {
        self.steps.push(Step {
            name: name.into(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            kind: StepKind::FanOut {
                generate: Arc::new(generate),
                reduce: reduce.map(|r| Arc::new(r) as Arc<_>),
            },
            retries: None,
            timeout_ms: None,
            undo: None,
        });
        self
    }

    /// Override the retry count for the most recently added step.
    pub fn with_retries(mut self, retries: u32) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.retries = Some(retries);
        }
        self
    }

    /// Set a per-attempt timeout for the most recently added step.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.timeout_ms = Some(timeout_ms);
        }
        self
    }

    /// Attach a compensating rollback handler to the most recently added
    /// step.
    pub fn with_undo<F>(
        mut self,
        undo: impl Fn(StepInput, serde_json::Value, CacheFacade) -> F + Send + Sync + 'static,
    ) -> Self
    where
        F: std::future::Future<Output = Result<(), corecache_core::CommandError>> + Send + 'static,
    {
        if let Some(step) = self.steps.last_mut() {
            let handler: UndoFn = Arc::new(move |input, result, facade| -> BoxFuture<'static, _> { Box::pin(undo(input, result, facade)) });
            step.undo = Some(handler);
        }
        self
    }

    /// Validate (unique names, known dependencies, acyclic graph) and
    /// compile the step list into Kahn-ordered execution batches.
    pub fn build(self) -> Result<Action, ConfigError> {
        let batches = validate_and_batch(&self.steps)?;
        Ok(Action::new(self.steps, batches))
    }
}
