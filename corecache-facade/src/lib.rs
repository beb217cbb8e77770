//! corecache-facade — the Cache Facade: key prefixing, default
//! TTL injection, timeout enforcement, retry with delay, metrics
//! aggregation, and pipeline/transaction fallback over a single [`Adapter`].

use std::sync::Arc;
use std::time::Duration;

use corecache_adapter::{Adapter, PipelineEntry, PipelineOutcome, TransactionOutcome};
use corecache_core::{
    CacheStats, Command, CommandArg, CommandError, FacadeConfig, OperationDescriptor,
};

type ErrorHandler = Arc<dyn Fn(&CommandError) + Send + Sync>;

/// Wraps an [`Adapter`] with the cross-cutting concerns every caller needs:
/// prefixing, timeouts, retries, and a hook for observing final failures.
#[derive(Clone)]
pub struct CacheFacade {
    adapter: Arc<dyn Adapter>,
    config: FacadeConfig,
    on_error: Option<ErrorHandler>,
}

impl CacheFacade {
    pub fn new(adapter: Arc<dyn Adapter>, config: FacadeConfig) -> Self {
        Self { adapter, config, on_error: None }
    }

    pub fn with_defaults(adapter: Arc<dyn Adapter>) -> Self {
        Self::new(adapter, FacadeConfig::default())
    }

    /// Install a handler invoked with the final error once retries are
    /// exhausted.
    pub fn with_error_handler(mut self, handler: impl Fn(&CommandError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &FacadeConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// `P:key` unless `key` already begins with `P:`.
    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            None => key.to_string(),
            Some(prefix) => {
                let with_sep = format!("{prefix}:");
                if key.starts_with(&with_sep) {
                    key.to_string()
                } else {
                    format!("{with_sep}{key}")
                }
            }
        }
    }

    /// Prefix every `CommandArg::Key` in `args`, in place order. The
    /// explicit `Key` tag means this applies uniformly
    /// whether the command takes one key or many — no per-command position
    /// table is needed.
    fn prefix_args(&self, args: Vec<CommandArg>) -> Vec<CommandArg> {
        args.into_iter()
            .map(|arg| match arg {
                CommandArg::Key(k) => CommandArg::Key(self.prefix_key(&k)),
                other => other,
            })
            .collect()
    }

    /// Inject `defaultTtlSeconds` into a `SET` call that doesn't already
    /// carry an explicit `EX`/`PX` modifier.
    fn inject_default_ttl(&self, command: Command, mut args: Vec<CommandArg>) -> Vec<CommandArg> {
        if command != Command::Set {
            return args;
        }
        let Some(ttl) = self.config.default_ttl_seconds else {
            return args;
        };
        let has_explicit_ttl = args
            .iter()
            .any(|a| matches!(a, CommandArg::Str(s) if s.eq_ignore_ascii_case("EX") || s.eq_ignore_ascii_case("PX")));
        if !has_explicit_ttl {
            args.push(CommandArg::Str("EX".to_string()));
            args.push(CommandArg::Int(ttl as i64));
        }
        args
    }

    /// Execute one command through the full pipeline: prefix → default-TTL
    /// injection → dispatch with timeout → retry with delay on a retryable
    /// error → on exhaustion, invoke `on_error` and either propagate or
    /// return the zero value.
    pub async fn dispatch(&self, command: Command, args: Vec<CommandArg>) -> Result<corecache_core::RawValue, CommandError> {
        let args = self.prefix_args(args);
        let args = self.inject_default_ttl(command, args);
        let attempts = self.config.default_options.retries.max(1);
        let timeout = Duration::from_millis(self.config.default_options.timeout_ms);
        let delay = Duration::from_millis(self.config.default_options.retry_delay_ms);

        let mut last_err = None;
        for attempt in 0..attempts {
            let result = tokio::time::timeout(timeout, self.adapter.dispatch(command, &args)).await;
            match result {
                Ok(Ok(raw)) => return Ok(raw),
                Ok(Err(e)) => {
                    let retryable = matches!(
                        e,
                        CommandError::Connection(_) | CommandError::Timeout(_) | CommandError::Command(_)
                    );
                    last_err = Some(e);
                    if !retryable || attempt + 1 == attempts {
                        break;
                    }
                }
                Err(_) => {
                    last_err = Some(CommandError::Timeout(timeout));
                    if attempt + 1 == attempts {
                        break;
                    }
                }
            }
            tokio::time::sleep(delay).await;
        }

        let err = last_err.unwrap_or_else(|| CommandError::Command("dispatch failed with no recorded error".into()));
        if let Some(handler) = &self.on_error {
            handler(&err);
        }
        if self.config.default_options.throw_on_error {
            Err(err)
        } else {
            Ok(corecache_core::RawValue::Nil)
        }
    }

    /// Build args from an [`OperationDescriptor`], dispatch them, and parse
    /// the result if the descriptor declares a parser.
    pub async fn execute(
        &self,
        descriptor: &OperationDescriptor,
        params: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, CommandError> {
        let args = (descriptor.build_args)(params)?;
        let raw = self.dispatch(descriptor.command, args).await?;
        match descriptor.parse_result {
            Some(parser) => Ok(Some(parser(&raw)?)),
            None => Ok(None),
        }
    }

    /// Prefix every entry's key arguments, then submit as a pipeline — the
    /// adapter's own `execute_pipeline` (native or the default sequential
    /// fallback) decides how entries are actually submitted.
    pub async fn execute_pipeline(&self, entries: Vec<PipelineEntry>) -> Vec<PipelineOutcome> {
        let prefixed: Vec<PipelineEntry> = entries
            .into_iter()
            .map(|entry| PipelineEntry { command: entry.command, args: self.prefix_args(entry.args) })
            .collect();
        self.adapter.execute_pipeline(&prefixed).await
    }

    pub async fn execute_transaction(&self, entries: Vec<PipelineEntry>) -> TransactionOutcome {
        let prefixed: Vec<PipelineEntry> = entries
            .into_iter()
            .map(|entry| PipelineEntry { command: entry.command, args: self.prefix_args(entry.args) })
            .collect();
        self.adapter.execute_transaction(&prefixed).await
    }

    pub async fn execute_script(
        &self,
        script: &str,
        keys: Vec<String>,
        args: Vec<CommandArg>,
    ) -> Result<corecache_core::RawValue, CommandError> {
        let keys: Vec<String> = keys.iter().map(|k| self.prefix_key(k)).collect();
        self.adapter.execute_script(script, &keys, &args).await
    }

    pub async fn stats(&self) -> Result<CacheStats, CommandError> {
        self.adapter.stats().await
    }

    pub async fn reset_stats(&self) {
        self.adapter.reset_stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corecache_adapter::InProcessAdapter;
    use corecache_core::DefaultOptions;

    fn facade() -> CacheFacade {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        CacheFacade::new(adapter, FacadeConfig::default().with_key_prefix("app"))
    }

    #[tokio::test]
    async fn dispatch_prefixes_key_arguments() {
        let facade = facade();
        facade
            .dispatch(Command::Set, vec![CommandArg::Key("user:1".into()), CommandArg::Str("v".into())])
            .await
            .unwrap();
        let raw = facade.adapter().get("app:user:1").await.unwrap();
        assert_eq!(raw.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn dispatch_injects_default_ttl_on_set_without_explicit_ttl() {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        let config = FacadeConfig::default().with_default_ttl_seconds(60);
        let facade = CacheFacade::new(adapter, config);
        facade.dispatch(Command::Set, vec![CommandArg::Key("k".into()), CommandArg::Str("v".into())]).await.unwrap();
        let ttl = facade.adapter().ttl("k").await.unwrap();
        assert!(ttl > 0 && ttl <= 60);
    }

    #[tokio::test]
    async fn dispatch_does_not_override_an_explicit_ttl() {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        let config = FacadeConfig::default().with_default_ttl_seconds(60);
        let facade = CacheFacade::new(adapter, config);
        facade
            .dispatch(
                Command::Set,
                vec![
                    CommandArg::Key("k".into()),
                    CommandArg::Str("v".into()),
                    CommandArg::Str("EX".into()),
                    CommandArg::Int(5),
                ],
            )
            .await
            .unwrap();
        let ttl = facade.adapter().ttl("k").await.unwrap();
        assert!(ttl > 0 && ttl <= 5);
    }

    #[tokio::test]
    async fn non_throwing_config_returns_nil_after_exhausted_retries() {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        let config = FacadeConfig::default().with_default_options(DefaultOptions {
            timeout_ms: 2_000,
            retries: 1,
            retry_delay_ms: 1,
            throw_on_error: false,
        });
        let facade = CacheFacade::new(adapter, config);
        let result = facade.dispatch(Command::XRead, vec![]).await.unwrap();
        assert_eq!(result, corecache_core::RawValue::Nil);
    }
}
