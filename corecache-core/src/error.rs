//! Error taxonomy shared by every corecache crate.

use thiserror::Error;

/// Errors raised while building or validating a [`crate::KeyBuilder`],
/// [`crate::Schema`], or an action's step graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required template token: {token}")]
    MissingToken { token: String },

    #[error("duplicate substitution for token: {token}")]
    DuplicateToken { token: String },

    #[error("invalid key template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("duplicate step name: {name}")]
    DuplicateStep { name: String },

    #[error("step {step:?} depends on unknown step {dependency:?}")]
    UnknownDependency { step: String, dependency: String },

    #[error("cycle detected among steps: {steps:?}")]
    Cycle { steps: Vec<String> },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Errors surfaced by an adapter implementation (distinct from `ConfigError`,
/// which is raised entirely client-side before any command is dispatched).
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("command rejected: {0}")]
    Command(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("failed to parse result: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("adapter does not support capability: {0}")]
    NotSupported(&'static str),
}

/// Top-level error type returned by every corecache crate.
#[derive(Debug, Clone, Error)]
pub enum CoreCacheError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),
}

impl CoreCacheError {
    /// Whether the facade should retry an operation that failed with this
    /// error: `ConnectionError`, `TimeoutError`, and `CommandError` are
    /// retried up to the configured attempts; every other kind is
    /// surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreCacheError::Command(
                CommandError::Connection(_) | CommandError::Timeout(_) | CommandError::Command(_)
            )
        )
    }
}

/// Result alias used throughout corecache.
pub type CoreCacheResult<T> = Result<T, CoreCacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_timeout_and_command_errors_are_retryable() {
        assert!(CoreCacheError::from(CommandError::Connection("x".into())).is_retryable());
        assert!(
            CoreCacheError::from(CommandError::Timeout(std::time::Duration::from_millis(1)))
                .is_retryable()
        );
        assert!(CoreCacheError::from(CommandError::Command("x".into())).is_retryable());
    }

    #[test]
    fn script_serialization_not_found_not_supported_are_not_retryable() {
        assert!(!CoreCacheError::from(CommandError::Script("x".into())).is_retryable());
        assert!(!CoreCacheError::from(CommandError::Serialization("x".into())).is_retryable());
        assert!(!CoreCacheError::from(CommandError::NotFound("x".into())).is_retryable());
        assert!(!CoreCacheError::from(CommandError::NotSupported("streams")).is_retryable());
    }

    #[test]
    fn config_error_is_never_retryable() {
        assert!(
            !CoreCacheError::from(ConfigError::MissingToken { token: "id".into() }).is_retryable()
        );
    }
}
