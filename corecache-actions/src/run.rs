//! Batched execution against a [`CacheFacade`].

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use corecache_adapter::PipelineEntry;
use corecache_core::{ActionExecuteConfig, ErrorStrategy};
use corecache_facade::CacheFacade;

use crate::error::StepError;
use crate::step::{ResolvedDeps, Step, StepInput, StepKind};

pub struct Action {
    steps: HashMap<String, Step>,
    batches: Vec<Vec<String>>,
}

/// `{success, results, errors, executionTimeMs, batches, rolledBack,
/// rollbackErrors}`.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub results: HashMap<String, serde_json::Value>,
    pub errors: HashMap<String, String>,
    pub execution_time_ms: u64,
    pub batches: usize,
    pub rolled_back: bool,
    pub rollback_errors: Vec<String>,
}

impl Action {
    pub(crate) fn new(steps: Vec<Step>, batches: Vec<Vec<String>>) -> Self {
        Self { steps: steps.into_iter().map(|s| (s.name.clone(), s)).collect(), batches }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub async fn run(&self, input: StepInput, facade: &CacheFacade, config: &ActionExecuteConfig) -> ActionResult {
        let start = Instant::now();
        let mut results: HashMap<String, serde_json::Value> = HashMap::new();
        let mut errors: HashMap<String, StepError> = HashMap::new();
        let mut completed_order: Vec<String> = Vec::new();
        let mut skipped: HashSet<String> = HashSet::new();
        let mut aborted_from: Option<usize> = None;

        for (batch_index, batch) in self.batches.iter().enumerate() {
            if let Some(_) = aborted_from {
                break;
            }

            if config.error_strategy == ErrorStrategy::SkipDependents {
                let to_skip: Vec<&String> = batch
                    .iter()
                    .filter(|name| {
                        let step = &self.steps[*name];
                        step.depends_on.iter().any(|dep| errors.contains_key(dep) || skipped.contains(dep))
                    })
                    .collect();
                for name in &to_skip {
                    let failed_dep = self.steps[name.as_str()]
                        .depends_on
                        .iter()
                        .find(|dep| errors.contains_key(*dep) || skipped.contains(*dep))
                        .cloned()
                        .unwrap_or_default();
                    skipped.insert((*name).clone());
                    errors.insert((*name).clone(), StepError::Skipped { step: (*name).clone(), dependency: failed_dep });
                }
            }

            let runnable: Vec<&String> = batch.iter().filter(|name| !skipped.contains(*name)).collect();
            if runnable.is_empty() {
                continue;
            }

            let resolved: ResolvedDeps = results.clone();

            // Coalesce every operation-kind step in this batch into one
            // pipeline; compute and fanOut steps run alongside it
            // concurrently.
            let operation_names: Vec<&String> =
                runnable.iter().filter(|name| matches!(self.steps[name.as_str()].kind, StepKind::Operation { .. })).cloned().collect();
            let other_names: Vec<&String> =
                runnable.iter().filter(|name| !matches!(self.steps[name.as_str()].kind, StepKind::Operation { .. })).cloned().collect();

            let pipeline_outcomes = if !operation_names.is_empty() {
                let entries: Vec<PipelineEntry> = operation_names
                    .iter()
                    .map(|name| {
                        let step = &self.steps[name.as_str()];
                        match &step.kind {
                            StepKind::Operation { descriptor, params } => {
                                let params_value = params(&input, &resolved);
                                let args = (descriptor.build_args)(&params_value).unwrap_or_default();
                                PipelineEntry { command: descriptor.command, args }
                            }
                            _ => unreachable!(),
                        }
                    })
                    .collect();
                Some(facade.execute_pipeline(entries).await)
            } else {
                None
            };

            for (idx, name) in operation_names.iter().enumerate() {
                let step = &self.steps[name.as_str()];
                let outcome = pipeline_outcomes.as_ref().and_then(|outcomes| outcomes.get(idx));
                match outcome {
                    Some(o) if o.success => {
                        let value = o
                            .data
                            .as_ref()
                            .map(|raw| raw_to_json(raw))
                            .unwrap_or(serde_json::Value::Null);
                        results.insert((*name).clone(), value);
                        completed_order.push((*name).clone());
                    }
                    Some(o) => {
                        // This entry's own failure, reported within an
                        // otherwise-complete pipeline outcome vec: record it
                        // directly, no retry fallback.
                        errors.insert(
                            (*name).clone(),
                            StepError::Command {
                                step: step.name.clone(),
                                source: corecache_core::CommandError::Command(
                                    o.error.clone().unwrap_or_else(|| "pipeline entry failed".into()),
                                ),
                            },
                        );
                    }
                    None => {
                        // Whole-pipeline failure (the outcome vec came back
                        // shorter than the entries submitted): fall back to
                        // an individual `execute` with the step's retry
                        // policy.
                        match self.run_operation_step(step, &input, &resolved, facade, config).await {
                            Ok(value) => {
                                results.insert((*name).clone(), value);
                                completed_order.push((*name).clone());
                            }
                            Err(e) => {
                                errors.insert((*name).clone(), e);
                            }
                        }
                    }
                }
            }

            for name in &other_names {
                let step = &self.steps[name.as_str()];
                let outcome = match &step.kind {
                    StepKind::Compute { compute } => {
                        self.run_with_retry(step, config, || compute(input.clone(), resolved.clone(), facade.clone())).await
                    }
                    StepKind::FanOut { generate, reduce } => {
                        let entries = generate(&input, &resolved);
                        let outcomes = facade.execute_pipeline(entries).await;
                        let failed = outcomes.iter().find(|o| !o.success);
                        match failed {
                            Some(o) => Err(StepError::Command {
                                step: step.name.clone(),
                                source: corecache_core::CommandError::Command(
                                    o.error.clone().unwrap_or_else(|| "fan-out entry failed".into()),
                                ),
                            }),
                            None => {
                                let raws: Vec<corecache_core::RawValue> =
                                    outcomes.into_iter().filter_map(|o| o.data).collect();
                                let value = match reduce {
                                    Some(r) => r(raws),
                                    None => serde_json::Value::Array(raws.iter().map(raw_to_json).collect()),
                                };
                                Ok(value)
                            }
                        }
                    }
                    StepKind::Operation { .. } => unreachable!(),
                };
                match outcome {
                    Ok(value) => {
                        results.insert((*name).clone(), value);
                        completed_order.push((*name).clone());
                    }
                    Err(e) => {
                        errors.insert((*name).clone(), e);
                    }
                }
            }

            let batch_failed = batch.iter().any(|name| errors.contains_key(name));
            if batch_failed && config.error_strategy == ErrorStrategy::Abort {
                aborted_from = Some(batch_index);
            }
            if config.error_strategy == ErrorStrategy::Continue {
                for name in batch {
                    if !results.contains_key(name) && !errors.contains_key(name) {
                        results.insert(name.clone(), serde_json::Value::Null);
                    }
                }
            }
        }

        let success = errors.is_empty();
        let mut rolled_back = false;
        let mut rollback_errors = Vec::new();
        if !success && config.rollback_on_failure {
            rolled_back = true;
            for name in completed_order.iter().rev() {
                let step = &self.steps[name];
                if let Some(undo) = &step.undo {
                    let step_result = results.get(name).cloned().unwrap_or(serde_json::Value::Null);
                    if let Err(e) = undo(input.clone(), step_result, facade.clone()).await {
                        rollback_errors.push(format!("{name}: {e}"));
                    }
                }
            }
        }

        ActionResult {
            success,
            results,
            errors: errors.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
            execution_time_ms: start.elapsed().as_millis() as u64,
            batches: self.batches.len(),
            rolled_back,
            rollback_errors,
        }
    }

    async fn run_operation_step(
        &self,
        step: &Step,
        input: &StepInput,
        resolved: &ResolvedDeps,
        facade: &CacheFacade,
        config: &ActionExecuteConfig,
    ) -> Result<serde_json::Value, StepError> {
        let (descriptor, params) = match &step.kind {
            StepKind::Operation { descriptor, params } => (descriptor, params),
            _ => unreachable!(),
        };
        self.run_with_retry(step, config, || async {
            let params_value = params(input, resolved);
            facade
                .execute(descriptor, &params_value)
                .await
                .map(|v| v.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    /// `max(stepRetries, globalRetries)` attempts with `retryDelayMs`
    /// between attempts; if `stepTimeoutMs` is set, each attempt races a
    /// timer that fails it with `StepTimedOut`.
    async fn run_with_retry<F, Fut>(&self, step: &Step, config: &ActionExecuteConfig, make_attempt: F) -> Result<serde_json::Value, StepError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, corecache_core::CommandError>>,
    {
        let attempts = step.retries.unwrap_or(0).max(config.retries).max(1);
        let delay = Duration::from_millis(config.retry_delay_ms);
        let timeout_ms = step.timeout_ms.or(config.step_timeout_ms);

        let mut last_err = None;
        for attempt in 0..attempts {
            let attempt_result = match timeout_ms {
                Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), make_attempt()).await {
                    Ok(r) => r.map_err(|source| StepError::Command { step: step.name.clone(), source }),
                    Err(_) => Err(StepError::TimedOut { step: step.name.clone(), timeout_ms: ms }),
                },
                None => make_attempt().await.map_err(|source| StepError::Command { step: step.name.clone(), source }),
            };
            match attempt_result {
                Ok(v) => return Ok(v),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| StepError::Command {
            step: step.name.clone(),
            source: corecache_core::CommandError::Command("no attempts made".into()),
        }))
    }
}

fn raw_to_json(raw: &corecache_core::RawValue) -> serde_json::Value {
    use corecache_core::RawValue;
    match raw {
        RawValue::Nil => serde_json::Value::Null,
        RawValue::Ok => serde_json::Value::String("OK".into()),
        RawValue::Integer(i) => serde_json::Value::from(*i),
        RawValue::Double(d) => serde_json::Number::from_f64(*d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        RawValue::Bulk(s) => serde_json::Value::String(s.clone()),
        RawValue::Boolean(b) => serde_json::Value::Bool(*b),
        RawValue::Array(items) => serde_json::Value::Array(items.iter().map(raw_to_json).collect()),
    }
}
