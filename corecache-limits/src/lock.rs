//! Lock Service: `acquireLock`/`releaseLock`/`extendLock`/
//! `withLock` over a single [`CacheFacade`].
//!
//! An acquired/released typestate works for a database-row lock held across
//! no suspension points, but a distributed lock backed by round-trips to an
//! adapter can't encode "acquired" in the type system the same way
//! (acquisition itself is async and fallible), so this keeps the
//! owner-id/TTL vocabulary but exposes it as a plain async API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use corecache_core::{CommandArg, CommandError, LockConfig};
use corecache_facade::CacheFacade;
use rand::Rng;

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("DEL", KEYS[1])
end
return 0
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
  return redis.call("PEXPIRE", KEYS[1], ARGV[2])
end
return 0
"#;

static OWNER_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Monotonic millis + a random suffix, unique per caller.
fn generate_owner_id() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis();
    let sequence = OWNER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let suffix: u32 = rand::thread_rng().gen();
    format!("{millis}-{sequence}-{suffix:08x}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockHandle {
    pub resource: String,
    pub owner_id: String,
}

#[derive(Clone)]
pub struct LockService {
    facade: CacheFacade,
    config: LockConfig,
}

impl LockService {
    pub fn new(facade: CacheFacade, config: LockConfig) -> Result<Self, CommandError> {
        config.validate().map_err(|e| CommandError::Command(e.to_string()))?;
        Ok(Self { facade, config })
    }

    fn key(&self, resource: &str) -> String {
        format!("{}:{resource}", self.config.key_prefix)
    }

    /// `SET key ownerId NX PX ttlMs`; success iff the adapter reports `OK`.
    /// Returns `None` when the resource is already held.
    pub async fn acquire_lock(&self, resource: &str, ttl_ms: Option<u64>, owner_id: Option<String>) -> Result<Option<LockHandle>, CommandError> {
        let owner_id = owner_id.unwrap_or_else(generate_owner_id);
        let ttl_ms = ttl_ms.unwrap_or(self.config.default_ttl_ms);
        let raw = self
            .facade
            .dispatch(
                corecache_core::Command::Set,
                vec![
                    CommandArg::Key(self.key(resource)),
                    CommandArg::Str(owner_id.clone()),
                    CommandArg::Str("NX".to_string()),
                    CommandArg::Str("PX".to_string()),
                    CommandArg::Int(ttl_ms as i64),
                ],
            )
            .await?;
        if matches!(raw, corecache_core::RawValue::Ok) {
            Ok(Some(LockHandle { resource: resource.to_string(), owner_id }))
        } else {
            Ok(None)
        }
    }

    /// Atomic compare-and-delete: `if GET == ownerId then DEL end`. Returns
    /// whether this call actually released the lock.
    pub async fn release_lock(&self, resource: &str, owner_id: &str) -> Result<bool, CommandError> {
        let key = self.key(resource);
        if self.facade.adapter().supports_script() {
            let raw = self.facade.execute_script(RELEASE_SCRIPT, vec![key], vec![CommandArg::Str(owner_id.to_string())]).await?;
            Ok(raw.as_integer().unwrap_or(0) > 0)
        } else {
            self.release_lock_fallback(&key, owner_id).await
        }
    }

    /// `GET` equality check then `DEL`; not safe under adversarial timing
    /// (the owner could change between the two round-trips) — callers must
    /// prefer script-capable adapters for production use.
    async fn release_lock_fallback(&self, key: &str, owner_id: &str) -> Result<bool, CommandError> {
        let current = self.facade.dispatch(corecache_core::Command::Get, vec![CommandArg::Key(key.to_string())]).await?;
        if current.as_bulk() != Some(owner_id) {
            return Ok(false);
        }
        let deleted = self.facade.dispatch(corecache_core::Command::Del, vec![CommandArg::Key(key.to_string())]).await?;
        Ok(deleted.as_integer().unwrap_or(0) > 0)
    }

    /// Atomic compare-and-pexpire.
    pub async fn extend_lock(&self, resource: &str, ttl_ms: u64, owner_id: &str) -> Result<bool, CommandError> {
        let key = self.key(resource);
        if self.facade.adapter().supports_script() {
            let raw = self
                .facade
                .execute_script(EXTEND_SCRIPT, vec![key], vec![CommandArg::Str(owner_id.to_string()), CommandArg::Int(ttl_ms as i64)])
                .await?;
            Ok(raw.as_integer().unwrap_or(0) > 0)
        } else {
            let current = self.facade.dispatch(corecache_core::Command::Get, vec![CommandArg::Key(key.clone())]).await?;
            if current.as_bulk() != Some(owner_id) {
                return Ok(false);
            }
            self.facade
                .dispatch(corecache_core::Command::Expire, vec![CommandArg::Key(key), CommandArg::Int((ttl_ms / 1000).max(1) as i64)])
                .await
                .map(|_| true)
        }
    }

    /// Repeatedly `acquireLock` with `retryIntervalMs` sleeps until
    /// `timeoutMs` elapses, then run `f` with the lock held by a scope
    /// guard — the lock is released whether `f` returns normally or panics.
    pub async fn with_lock<F, Fut, T>(&self, resource: &str, timeout_ms: Option<u64>, f: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let deadline = std::time::Instant::now() + Duration::from_millis(timeout_ms.unwrap_or(self.config.default_timeout_ms));
        let retry_interval = Duration::from_millis(self.config.default_retry_interval_ms);

        let handle = loop {
            match self.acquire_lock(resource, None, None).await.map_err(LockError::Command)? {
                Some(handle) => break handle,
                None => {
                    if std::time::Instant::now() >= deadline {
                        return Err(LockError::AcquireTimedOut { resource: resource.to_string() });
                    }
                    tokio::time::sleep(retry_interval).await;
                }
            }
        };

        let _guard = LockGuard { service: self.clone(), handle: Some(handle) };
        Ok(f().await)
    }
}

/// Releases its held lock on drop, including when the caller's body panics
/// mid-await — `Drop::drop` is synchronous, so release is handed off to a
/// detached task rather than awaited inline.
struct LockGuard {
    service: LockService,
    handle: Option<LockHandle>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        let service = self.service.clone();
        tokio::spawn(async move {
            if let Err(e) = service.release_lock(&handle.resource, &handle.owner_id).await {
                tracing::warn!(resource = %handle.resource, error = %e, "failed to release lock after withLock body ran");
            }
        });
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LockError {
    #[error("timed out waiting to acquire lock on {resource:?}")]
    AcquireTimedOut { resource: String },
    #[error(transparent)]
    Command(#[from] CommandError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use corecache_adapter::{Adapter, InProcessAdapter};
    use corecache_core::FacadeConfig;
    use std::sync::Arc;

    fn service() -> LockService {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        let facade = CacheFacade::new(adapter, FacadeConfig::default());
        LockService::new(facade, LockConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn second_acquire_fails_while_first_holds_the_lock() {
        let svc = service();
        let first = svc.acquire_lock("job-1", Some(10_000), None).await.unwrap();
        assert!(first.is_some());
        let second = svc.acquire_lock("job-1", Some(10_000), None).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn release_with_wrong_owner_is_a_no_op() {
        let svc = service();
        let handle = svc.acquire_lock("job-2", Some(10_000), None).await.unwrap().unwrap();
        assert!(!svc.release_lock("job-2", "not-the-owner").await.unwrap());
        assert!(svc.release_lock("job-2", &handle.owner_id).await.unwrap());
    }

    #[tokio::test]
    async fn release_makes_the_resource_acquirable_again() {
        let svc = service();
        let handle = svc.acquire_lock("job-3", Some(10_000), None).await.unwrap().unwrap();
        svc.release_lock("job-3", &handle.owner_id).await.unwrap();
        assert!(svc.acquire_lock("job-3", Some(10_000), None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn with_lock_releases_even_when_body_runs() {
        let svc = service();
        let result = svc.with_lock("job-4", Some(1_000), || async { 42 }).await.unwrap();
        assert_eq!(result, 42);
        assert!(svc.acquire_lock("job-4", Some(10_000), None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn with_lock_times_out_when_already_held() {
        let svc = service();
        let _handle = svc.acquire_lock("job-5", Some(10_000), None).await.unwrap().unwrap();
        let result = svc.with_lock("job-5", Some(50), || async { () }).await;
        assert!(matches!(result, Err(LockError::AcquireTimedOut { .. })));
    }
}
