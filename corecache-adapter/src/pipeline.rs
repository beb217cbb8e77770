//! Pipeline and transaction result shapes.

use corecache_core::{Command, CommandArg, CommandError, RawValue};

/// One queued command in a pipeline or transaction: `(operation descriptor,
/// typed parameters)` reduced to the adapter-agnostic `(command, args)` pair
/// the facade already resolved.
#[derive(Debug, Clone)]
pub struct PipelineEntry {
    pub command: Command,
    pub args: Vec<CommandArg>,
}

impl PipelineEntry {
    pub fn new(command: Command, args: Vec<CommandArg>) -> Self {
        Self { command, args }
    }
}

/// Outcome of one pipeline entry. Failures in one entry never short-circuit
/// the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub success: bool,
    pub data: Option<RawValue>,
    pub error: Option<String>,
}

impl PipelineOutcome {
    pub fn ok(data: RawValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: Result<RawValue, CommandError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::err(e.to_string()),
        }
    }
}

/// Outcome of `executeTransaction`: all-or-nothing.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub success: bool,
    pub committed: bool,
    pub results: Option<Vec<RawValue>>,
    pub error: Option<String>,
}

impl TransactionOutcome {
    pub fn committed(results: Vec<RawValue>) -> Self {
        Self {
            success: true,
            committed: true,
            results: Some(results),
            error: None,
        }
    }

    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            success: false,
            committed: false,
            results: None,
            error: Some(error.into()),
        }
    }
}

/// One record in a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub id: String,
    pub fields: Vec<(String, String)>,
}
