//! Rate-Limit Service: fixed/sliding/token-bucket/multi-tier/quota
//! strategies over a single [`CacheFacade`].

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use corecache_core::{CommandArg, CommandError, RateLimitConfig, WindowLimit};
use corecache_facade::CacheFacade;

const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call("INCR", KEYS[1])
if count == 1 then
  redis.call("PEXPIRE", KEYS[1], ARGV[1])
end
local ttl = redis.call("PTTL", KEYS[1])
return {count, ttl}
"#;

const SLIDING_WINDOW_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local max_requests = tonumber(ARGV[3])
local member = ARGV[4]
redis.call("ZREMRANGEBYSCORE", KEYS[1], "-inf", now - window_ms)
local count = redis.call("ZCARD", KEYS[1])
local allowed = 0
if count < max_requests then
  redis.call("ZADD", KEYS[1], now, member)
  redis.call("PEXPIRE", KEYS[1], window_ms)
  allowed = 1
  count = count + 1
end
local oldest = redis.call("ZRANGE", KEYS[1], 0, 0, "WITHSCORES")
return {allowed, count, oldest[2] or now}
"#;

fn now_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}

/// `{allowed, remaining, resetAt, retryAfter?, headers}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: i64,
    pub retry_after: Option<i64>,
    pub headers: HashMap<String, String>,
}

impl RateLimitResult {
    fn new(allowed: bool, remaining: i64, reset_at: i64, max: i64) -> Self {
        let retry_after = if allowed { None } else { Some((reset_at - now_millis() / 1000).max(0)) };
        let mut headers = HashMap::new();
        headers.insert("X-RateLimit-Limit".to_string(), max.to_string());
        headers.insert("X-RateLimit-Remaining".to_string(), remaining.max(0).to_string());
        headers.insert("X-RateLimit-Reset".to_string(), reset_at.to_string());
        if let Some(retry) = retry_after {
            headers.insert("Retry-After".to_string(), retry.to_string());
        }
        Self { allowed, remaining: remaining.max(0), reset_at, retry_after, headers }
    }
}

pub struct RateLimitService {
    facade: CacheFacade,
    config: RateLimitConfig,
}

impl RateLimitService {
    pub fn new(facade: CacheFacade, config: RateLimitConfig) -> Self {
        Self { facade, config }
    }

    fn key(&self, endpoint: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.config.key_prefix, endpoint, identifier)
    }

    /// `HGETALL` routed through the facade so the key is prefixed like every
    /// other command this service issues.
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, CommandError> {
        let raw = self.facade.dispatch(corecache_core::Command::HGetAll, vec![CommandArg::Key(key.to_string())]).await?;
        let items = match raw {
            corecache_core::RawValue::Array(items) => items,
            _ => Vec::new(),
        };
        let mut map = HashMap::new();
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            if let (Some(f), Some(v)) = (field.as_bulk(), value.as_bulk()) {
                map.insert(f.to_string(), v.to_string());
            }
        }
        Ok(map)
    }

    /// Fixed window, the default strategy.
    pub async fn check(&self, identifier: &str, endpoint: &str) -> Result<RateLimitResult, CommandError> {
        let limit = self.config.limit_for(endpoint);
        let key = self.key(endpoint, identifier);
        let (count, ttl_ms) = if self.facade.adapter().supports_script() {
            let raw = self
                .facade
                .execute_script(
                    FIXED_WINDOW_SCRIPT,
                    vec![key],
                    vec![CommandArg::Int((limit.window_seconds * 1000) as i64)],
                )
                .await?;
            match raw {
                corecache_core::RawValue::Array(items) if items.len() == 2 => {
                    (items[0].as_integer().unwrap_or(0), items[1].as_integer().unwrap_or(0))
                }
                _ => return Err(CommandError::Script("unexpected fixed-window script reply".into())),
            }
        } else {
            self.fixed_window_fallback(&key, limit).await?
        };

        let reset_at = now_millis() / 1000 + (ttl_ms.max(0) / 1000);
        let allowed = count <= limit.max_requests as i64;
        Ok(RateLimitResult::new(allowed, limit.max_requests as i64 - count, reset_at, limit.max_requests as i64))
    }

    /// Non-script fallback: `INCR` then, iff the result is `1`, `EXPIRE`
    /// (in that order, atomic only with respect to the adapter's own
    /// single-command guarantees), then a `TTL` read.
    async fn fixed_window_fallback(&self, key: &str, limit: WindowLimit) -> Result<(i64, i64), CommandError> {
        let count = self
            .facade
            .dispatch(corecache_core::Command::Incr, vec![CommandArg::Key(key.to_string())])
            .await?
            .as_integer()
            .unwrap_or(0);
        if count == 1 {
            self.facade
                .dispatch(
                    corecache_core::Command::Expire,
                    vec![CommandArg::Key(key.to_string()), CommandArg::Int(limit.window_seconds as i64)],
                )
                .await?;
        }
        let ttl_seconds = self
            .facade
            .dispatch(corecache_core::Command::Ttl, vec![CommandArg::Key(key.to_string())])
            .await?
            .as_integer()
            .unwrap_or(limit.window_seconds as i64);
        Ok((count, ttl_seconds.max(0) * 1000))
    }

    /// Sliding window — opt-in, script-capable adapters
    /// only; the sorted-set-of-timestamps approach has no documented
    /// non-script fallback.
    pub async fn check_sliding(
        &self,
        identifier: &str,
        endpoint: &str,
        window_ms: u64,
        max_requests: u64,
    ) -> Result<RateLimitResult, CommandError> {
        if !self.facade.adapter().supports_script() {
            return Err(CommandError::NotSupported("script"));
        }
        let key = format!("{}:sliding:{endpoint}:{identifier}", self.config.key_prefix);
        let now = now_millis();
        let member = format!("{now}-{}", rand::random::<u32>());
        let raw = self
            .facade
            .execute_script(
                SLIDING_WINDOW_SCRIPT,
                vec![key],
                vec![
                    CommandArg::Int(now),
                    CommandArg::Int(window_ms as i64),
                    CommandArg::Int(max_requests as i64),
                    CommandArg::Str(member),
                ],
            )
            .await?;
        let (allowed, count, oldest) = match raw {
            corecache_core::RawValue::Array(items) if items.len() == 3 => (
                items[0].as_integer().unwrap_or(0) == 1,
                items[1].as_integer().unwrap_or(0),
                items[2].as_bulk().and_then(|s| s.parse::<i64>().ok()).or_else(|| items[2].as_integer()).unwrap_or(now),
            ),
            _ => return Err(CommandError::Script("unexpected sliding-window script reply".into())),
        };
        let reset_at = (oldest + window_ms as i64) / 1000;
        Ok(RateLimitResult::new(allowed, max_requests as i64 - count, reset_at, max_requests as i64))
    }

    /// Token bucket: `{tokens, lastRefill}` held in a
    /// hash; refilled lazily on each check. No script dependency — the read
    /// and write are two separate adapter round-trips, documented as
    /// non-atomic under concurrent callers for the same key.
    pub async fn check_token_bucket(
        &self,
        identifier: &str,
        bucket_size: f64,
        refill_rate_per_ms: f64,
        tokens_requested: f64,
    ) -> Result<RateLimitResult, CommandError> {
        let key = format!("{}:bucket:{identifier}", self.config.key_prefix);
        let state = self.hgetall(&key).await?;
        let now = now_millis();
        let last_refill = state.get("lastRefill").and_then(|v| v.parse::<i64>().ok()).unwrap_or(now);
        let tokens = state.get("tokens").and_then(|v| v.parse::<f64>().ok()).unwrap_or(bucket_size);

        let elapsed = (now - last_refill).max(0) as f64;
        let refilled = (tokens + elapsed * refill_rate_per_ms).min(bucket_size);
        let allowed = refilled >= tokens_requested;
        let remaining_tokens = if allowed { refilled - tokens_requested } else { refilled };

        self.facade
            .dispatch(
                corecache_core::Command::HSet,
                vec![
                    CommandArg::Key(key.clone()),
                    CommandArg::Str("tokens".into()),
                    CommandArg::Str(remaining_tokens.to_string()),
                ],
            )
            .await?;
        self.facade
            .dispatch(
                corecache_core::Command::HSet,
                vec![CommandArg::Key(key), CommandArg::Str("lastRefill".into()), CommandArg::Str(now.to_string())],
            )
            .await?;

        let reset_at = now / 1000 + 1;
        Ok(RateLimitResult::new(allowed, remaining_tokens as i64, reset_at, bucket_size as i64))
    }

    /// Multi-tier: admit iff every tier's fixed window
    /// admits; only the admitted tiers are incremented.
    pub async fn check_multi_tier(&self, identifier: &str, endpoint: &str, tiers: &[WindowLimit]) -> Result<RateLimitResult, CommandError> {
        let mut tightest: Option<RateLimitResult> = None;
        for (idx, tier) in tiers.iter().enumerate() {
            let key = format!("{}:{endpoint}:tier{idx}:{identifier}", self.config.key_prefix);
            let current = self.facade.dispatch(corecache_core::Command::Get, vec![CommandArg::Key(key.clone())]).await?;
            let count = current.as_bulk().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
            if count >= tier.max_requests as i64 {
                let ttl = self.facade.dispatch(corecache_core::Command::Ttl, vec![CommandArg::Key(key)]).await?.as_integer().unwrap_or(0);
                let reset_at = now_millis() / 1000 + ttl.max(0);
                return Ok(RateLimitResult::new(false, 0, reset_at, tier.max_requests as i64));
            }
        }
        for (idx, tier) in tiers.iter().enumerate() {
            let key = format!("{}:{endpoint}:tier{idx}:{identifier}", self.config.key_prefix);
            let count =
                self.facade.dispatch(corecache_core::Command::Incr, vec![CommandArg::Key(key.clone())]).await?.as_integer().unwrap_or(0);
            if count == 1 {
                self.facade
                    .dispatch(corecache_core::Command::Expire, vec![CommandArg::Key(key.clone()), CommandArg::Int(tier.window_seconds as i64)])
                    .await?;
            }
            let ttl = self.facade.dispatch(corecache_core::Command::Ttl, vec![CommandArg::Key(key)]).await?.as_integer().unwrap_or(tier.window_seconds as i64);
            let reset_at = now_millis() / 1000 + ttl.max(0);
            let result = RateLimitResult::new(true, tier.max_requests as i64 - count, reset_at, tier.max_requests as i64);
            tightest = Some(match tightest {
                Some(t) if t.remaining <= result.remaining => t,
                _ => result,
            });
        }
        Ok(tightest.unwrap_or_else(|| RateLimitResult::new(true, 0, now_millis() / 1000, 0)))
    }

    /// Quota: `{used, lastReset}`, resetting when
    /// `now >= resetTime && lastReset < resetTime`.
    pub async fn check_quota(&self, identifier: &str, quota: u64, period_seconds: u64, cost: u64) -> Result<RateLimitResult, CommandError> {
        let key = format!("{}:quota:{identifier}", self.config.key_prefix);
        let state = self.hgetall(&key).await?;
        let now = now_millis() / 1000;
        let last_reset = state.get("lastReset").and_then(|v| v.parse::<i64>().ok()).unwrap_or(now);
        let reset_time = last_reset + period_seconds as i64;
        let (used, reset_time) = if now >= reset_time {
            (0i64, now + period_seconds as i64)
        } else {
            (state.get("used").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0), reset_time)
        };

        let allowed = used + cost as i64 <= quota as i64;
        let new_used = if allowed { used + cost as i64 } else { used };

        self.facade
            .dispatch(
                corecache_core::Command::HSet,
                vec![CommandArg::Key(key.clone()), CommandArg::Str("used".into()), CommandArg::Str(new_used.to_string())],
            )
            .await?;
        self.facade
            .dispatch(
                corecache_core::Command::HSet,
                vec![CommandArg::Key(key), CommandArg::Str("lastReset".into()), CommandArg::Str((reset_time - period_seconds as i64).to_string())],
            )
            .await?;

        Ok(RateLimitResult::new(allowed, quota as i64 - new_used, reset_time, quota as i64))
    }

    /// Delete the counter for `(identifier, endpoint)`.
    pub async fn reset(&self, identifier: &str, endpoint: &str) -> Result<(), CommandError> {
        let key = self.key(endpoint, identifier);
        self.facade.dispatch(corecache_core::Command::Del, vec![CommandArg::Key(key)]).await?;
        Ok(())
    }

    /// Read-only status for `(identifier, endpoint)`; does not increment
    /// the counter.
    pub async fn get_status(&self, identifier: &str, endpoint: &str) -> Result<RateLimitResult, CommandError> {
        let limit = self.config.limit_for(endpoint);
        let key = self.key(endpoint, identifier);
        let current = self.facade.dispatch(corecache_core::Command::Get, vec![CommandArg::Key(key.clone())]).await?;
        let count = current.as_bulk().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
        let ttl = self.facade.dispatch(corecache_core::Command::Ttl, vec![CommandArg::Key(key)]).await?.as_integer().unwrap_or(-2);
        let reset_at = now_millis() / 1000 + ttl.max(0);
        Ok(RateLimitResult::new(count <= limit.max_requests as i64, limit.max_requests as i64 - count, reset_at, limit.max_requests as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corecache_adapter::{Adapter, InProcessAdapter};
    use corecache_core::FacadeConfig;
    use std::sync::Arc;

    fn service(config: RateLimitConfig) -> RateLimitService {
        let adapter: Arc<dyn Adapter> = Arc::new(InProcessAdapter::new());
        let facade = CacheFacade::new(adapter, FacadeConfig::default());
        RateLimitService::new(facade, config)
    }

    #[tokio::test]
    async fn fixed_window_admits_until_max_then_blocks() {
        let mut config = RateLimitConfig::default();
        config.default_config = WindowLimit { max_requests: 2, window_seconds: 60 };
        let svc = service(config);

        assert!(svc.check("user-1", "login").await.unwrap().allowed);
        assert!(svc.check("user-1", "login").await.unwrap().allowed);
        let third = svc.check("user-1", "login").await.unwrap();
        assert!(!third.allowed);
        assert!(third.retry_after.is_some());
    }

    #[tokio::test]
    async fn reset_clears_the_counter() {
        let mut config = RateLimitConfig::default();
        config.default_config = WindowLimit { max_requests: 1, window_seconds: 60 };
        let svc = service(config);

        assert!(svc.check("user-2", "login").await.unwrap().allowed);
        assert!(!svc.check("user-2", "login").await.unwrap().allowed);
        svc.reset("user-2", "login").await.unwrap();
        assert!(svc.check("user-2", "login").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn quota_resets_after_period_elapses() {
        let svc = service(RateLimitConfig::default());
        let first = svc.check_quota("tenant-a", 10, 0, 5).await.unwrap();
        assert!(first.allowed);
        let second = svc.check_quota("tenant-a", 10, 0, 5).await.unwrap();
        assert!(second.allowed);
    }
}
