//! corecache test utilities
//!
//! Centralized test infrastructure shared by every corecache crate:
//! - Proptest generators for commands, args, and service configuration
//! - Fixtures for common adapter/facade setups
//! - Custom assertions for corecache-specific result shapes

pub use corecache_adapter::{Adapter, InProcessAdapter};
pub use corecache_core::{
    ActionExecuteConfig, CommandArg, CommandError, ConfigError, DefaultOptions, ErrorStrategy,
    FacadeConfig, LockConfig, RateLimitConfig, RawValue, WindowLimit,
};
pub use corecache_facade::CacheFacade;

use std::sync::Arc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for corecache's core value types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a key-safe identifier: `[a-zA-Z0-9_]{1,32}`.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_]{1,32}".prop_map(|s| s)
    }

    /// Generate a `CommandArg::Key`.
    pub fn arb_key_arg() -> impl Strategy<Value = CommandArg> {
        arb_identifier().prop_map(CommandArg::Key)
    }

    /// Generate any `CommandArg` variant.
    pub fn arb_command_arg() -> impl Strategy<Value = CommandArg> {
        prop_oneof![
            arb_identifier().prop_map(CommandArg::Str),
            any::<i64>().prop_map(CommandArg::Int),
            any::<f64>().prop_map(CommandArg::Float),
            any::<bool>().prop_map(CommandArg::Bool),
            arb_key_arg(),
        ]
    }

    /// Generate a flat (non-`Array`) `RawValue`, the shapes every adapter
    /// actually returns for scalar commands.
    pub fn arb_scalar_raw_value() -> impl Strategy<Value = RawValue> {
        prop_oneof![
            Just(RawValue::Nil),
            Just(RawValue::Ok),
            any::<i64>().prop_map(RawValue::Integer),
            any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(RawValue::Double),
            ".*".prop_map(RawValue::Bulk),
            any::<bool>().prop_map(RawValue::Boolean),
        ]
    }

    /// Generate a `WindowLimit` with realistic bounds.
    pub fn arb_window_limit() -> impl Strategy<Value = WindowLimit> {
        (1u64..10_000, 1u64..86_400).prop_map(|(max_requests, window_seconds)| WindowLimit { max_requests, window_seconds })
    }

    /// Generate a `DefaultOptions` with realistic bounds.
    pub fn arb_default_options() -> impl Strategy<Value = DefaultOptions> {
        (100u64..30_000, 0u32..5, 0u64..1_000, any::<bool>()).prop_map(|(timeout_ms, retries, retry_delay_ms, throw_on_error)| DefaultOptions {
            timeout_ms,
            retries,
            retry_delay_ms,
            throw_on_error,
        })
    }

    /// Generate one of the three `ErrorStrategy` variants.
    pub fn arb_error_strategy() -> impl Strategy<Value = ErrorStrategy> {
        prop_oneof![Just(ErrorStrategy::Abort), Just(ErrorStrategy::SkipDependents), Just(ErrorStrategy::Continue)]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built adapter/facade/config fixtures for common test scenarios.

    use super::*;

    /// A bare in-process adapter with no size limit.
    pub fn in_process_adapter() -> Arc<dyn Adapter> {
        Arc::new(InProcessAdapter::new())
    }

    /// A facade over a fresh in-process adapter with default configuration.
    pub fn default_facade() -> CacheFacade {
        CacheFacade::with_defaults(in_process_adapter())
    }

    /// A facade over a fresh in-process adapter, prefixed and with a tight
    /// retry policy so retry-exhaustion tests run fast.
    pub fn fast_retry_facade(key_prefix: &str) -> CacheFacade {
        let config = FacadeConfig::default().with_key_prefix(key_prefix).with_default_options(DefaultOptions {
            timeout_ms: 500,
            retries: 2,
            retry_delay_ms: 1,
            throw_on_error: true,
        });
        CacheFacade::new(in_process_adapter(), config)
    }

    /// A `RateLimitConfig` with a small default window, useful for exercising
    /// the "blocked" path without generating thousands of requests.
    pub fn tight_rate_limit_config() -> RateLimitConfig {
        let mut config = RateLimitConfig::default();
        config.default_config = WindowLimit { max_requests: 3, window_seconds: 60 };
        config
    }

    /// A `LockConfig` with a short default TTL and fast retry interval,
    /// useful for exercising `withLock` timeout paths without slow tests.
    pub fn fast_lock_config() -> LockConfig {
        LockConfig { key_prefix: "lock".to_string(), default_ttl_ms: 1_000, default_timeout_ms: 200, default_retry_interval_ms: 10 }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for corecache-specific result shapes.

    use super::*;

    /// Assert that a `CommandError` is one of the three retryable kinds
    /// (`Connection`, `Timeout`, `Command`).
    #[track_caller]
    pub fn assert_retryable(err: &CommandError) {
        assert!(
            matches!(err, CommandError::Connection(_) | CommandError::Timeout(_) | CommandError::Command(_)),
            "expected a retryable error, got: {err:?}"
        );
    }

    /// Assert that a `CommandError` is NOT one of the three retryable kinds.
    #[track_caller]
    pub fn assert_not_retryable(err: &CommandError) {
        assert!(
            !matches!(err, CommandError::Connection(_) | CommandError::Timeout(_) | CommandError::Command(_)),
            "expected a non-retryable error, got: {err:?}"
        );
    }

    /// Assert that a raw value is the zero value the facade falls back to
    /// when `throwOnError` is `false` and retries are exhausted.
    #[track_caller]
    pub fn assert_nil(value: &RawValue) {
        assert!(value.is_nil(), "expected RawValue::Nil, got: {value:?}");
    }

    /// Assert that a `ConfigError` is the specific cycle variant and that it
    /// names the given steps (ignoring order).
    #[track_caller]
    pub fn assert_cycle_contains(err: &ConfigError, expected_steps: &[&str]) {
        match err {
            ConfigError::Cycle { steps } => {
                for name in expected_steps {
                    assert!(steps.iter().any(|s| s == name), "cycle {steps:?} does not contain step {name:?}");
                }
            }
            other => panic!("expected ConfigError::Cycle, got: {other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn default_facade_round_trips_a_value() {
        let facade = fixtures::default_facade();
        facade
            .dispatch(corecache_core::Command::Set, vec![CommandArg::Key("k".into()), CommandArg::Str("v".into())])
            .await
            .unwrap();
        let raw = facade.dispatch(corecache_core::Command::Get, vec![CommandArg::Key("k".into())]).await.unwrap();
        assert_eq!(raw, RawValue::Bulk("v".into()));
    }

    #[test]
    fn connection_timeout_and_command_errors_are_retryable() {
        assertions::assert_retryable(&CommandError::Connection("x".into()));
        assertions::assert_retryable(&CommandError::Timeout(std::time::Duration::from_millis(1)));
        assertions::assert_retryable(&CommandError::Command("x".into()));
        assertions::assert_not_retryable(&CommandError::NotFound("x".into()));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_window_limit_has_positive_bounds(limit in generators::arb_window_limit()) {
            prop_assert!(limit.max_requests > 0);
            prop_assert!(limit.window_seconds > 0);
        }

        #[test]
        fn prop_generated_default_options_has_sane_bounds(opts in generators::arb_default_options()) {
            prop_assert!(opts.timeout_ms >= 100);
        }
    }
}
