//! The in-process adapter: the default, zero-external-dependency backend.
//! Holds everything in a single
//! `tokio::sync::Mutex<Store>` — there is exactly one writer at a time, which
//! is fine for the single-node, no-persistence use case this adapter targets.

mod hashes;
mod hll_bloom;
mod keys;
mod lists;
mod sets;
mod sorted_set;
pub mod store;
mod streams;
mod strings;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use corecache_core::{CacheStats, Command, CommandArg, CommandError, DataType, Metrics, RawValue};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::adapter::{Adapter, AdapterResult, ScanPage};
use crate::options::{ScanOptions, SetOptions, SetOutcome, TrimStrategy, ZAddOptions};
use crate::pipeline::{PipelineEntry, StreamRecord, TransactionOutcome};
use store::Store;

/// How often the background sweeper clears expired keys.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub struct InProcessAdapter {
    store: Arc<Mutex<Store>>,
    metrics: Metrics,
    sweeper: Option<JoinHandle<()>>,
}

impl InProcessAdapter {
    /// Construct an adapter with no size limit and a running background
    /// sweeper. Use [`InProcessAdapter::with_max_size`] to bound memory with
    /// FIFO eviction instead.
    pub fn new() -> Self {
        Self::with_max_size(None)
    }

    pub fn with_max_size(max_size: Option<usize>) -> Self {
        let store = Arc::new(Mutex::new(Store::new(max_size)));
        let sweeper = Some(Self::spawn_sweeper(store.clone()));
        Self { store, metrics: Metrics::new(), sweeper }
    }

    fn spawn_sweeper(store: Arc<Mutex<Store>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DEFAULT_SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let mut guard = store.lock().await;
                guard.sweep_expired();
            }
        })
    }

    async fn timed<T>(
        &self,
        name: &'static str,
        fut: impl std::future::Future<Output = AdapterResult<T>>,
    ) -> AdapterResult<T> {
        let start = Instant::now();
        let result = fut.await;
        self.metrics
            .record_command(name, start.elapsed().as_micros() as u64, result.is_err());
        result
    }
}

impl Default for InProcessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InProcessAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------
// CommandArg decoding helpers for `dispatch`
// ---------------------------------------------------------------------

fn arg_str(args: &[CommandArg], i: usize) -> Result<String, CommandError> {
    args.get(i)
        .map(|a| a.to_string())
        .ok_or_else(|| CommandError::Command(format!("missing argument at position {i}")))
}

fn arg_key(args: &[CommandArg], i: usize) -> Result<String, CommandError> {
    match args.get(i) {
        Some(CommandArg::Key(k)) => Ok(k.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(CommandError::Command(format!("missing key argument at position {i}"))),
    }
}

fn arg_int(args: &[CommandArg], i: usize) -> Result<i64, CommandError> {
    match args.get(i) {
        Some(CommandArg::Int(n)) => Ok(*n),
        Some(CommandArg::Str(s)) => s.parse().map_err(|_| CommandError::Command(format!("argument {i} is not an integer"))),
        _ => Err(CommandError::Command(format!("missing integer argument at position {i}"))),
    }
}

fn arg_float(args: &[CommandArg], i: usize) -> Result<f64, CommandError> {
    match args.get(i) {
        Some(CommandArg::Float(f)) => Ok(*f),
        Some(CommandArg::Int(n)) => Ok(*n as f64),
        Some(CommandArg::Str(s)) => s.parse().map_err(|_| CommandError::Command(format!("argument {i} is not a float"))),
        _ => Err(CommandError::Command(format!("missing float argument at position {i}"))),
    }
}

fn rest_as_strings(args: &[CommandArg], from: usize) -> Vec<String> {
    args[from.min(args.len())..].iter().map(|a| a.to_string()).collect()
}

/// Parse `SET`'s trailing modifiers (`NX`, `XX`, `EX seconds`, `PX millis`,
/// `KEEPTTL`) out of the generic dispatch args, so callers that go through
/// `Command::Set` (the Lock Service, scripts, actions) get the same
/// semantics as the typed [`Adapter::set`] method.
fn set_options_from_args(args: &[CommandArg], from: usize) -> SetOptions {
    let mut opts = SetOptions::default();
    let mut i = from;
    while i < args.len() {
        match args[i].to_string().to_ascii_uppercase().as_str() {
            "NX" => opts.nx = true,
            "XX" => opts.xx = true,
            "KEEPTTL" => opts.keep_ttl = true,
            "EX" => {
                if let Ok(seconds) = arg_int(args, i + 1) {
                    opts.ex = Some(seconds as u64);
                }
                i += 1;
            }
            "PX" => {
                if let Ok(millis) = arg_int(args, i + 1) {
                    opts.px = Some(millis as u64);
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    opts
}

fn strings_to_raw(values: Vec<String>) -> RawValue {
    RawValue::Array(values.into_iter().map(RawValue::Bulk).collect())
}

fn opt_string_to_raw(value: Option<String>) -> RawValue {
    value.map(RawValue::Bulk).unwrap_or(RawValue::Nil)
}

fn member_scores_to_raw(pairs: Vec<(String, f64)>) -> RawValue {
    RawValue::Array(
        pairs
            .into_iter()
            .flat_map(|(m, s)| [RawValue::Bulk(m), RawValue::Double(s)])
            .collect(),
    )
}

#[async_trait]
impl Adapter for InProcessAdapter {
    fn supports_streams(&self) -> bool {
        true
    }
    fn supports_hyperloglog(&self) -> bool {
        true
    }
    fn supports_bloom(&self) -> bool {
        true
    }
    fn supports_script(&self) -> bool {
        false
    }
    fn supports_pubsub(&self) -> bool {
        false
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> AdapterResult<SetOutcome> {
        self.timed("SET", async {
            let mut store = self.store.lock().await;
            strings::set(&mut store, key, value, opts)
        })
        .await
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        let result = self
            .timed("GET", async {
                let mut store = self.store.lock().await;
                strings::get(&mut store, key)
            })
            .await;
        match &result {
            Ok(Some(_)) => self.metrics.record_hit(),
            Ok(None) => self.metrics.record_miss(),
            Err(_) => {}
        }
        result
    }

    async fn mset(&self, pairs: &[(String, String)]) -> AdapterResult<()> {
        self.timed("MSET", async {
            let mut store = self.store.lock().await;
            strings::mset(&mut store, pairs)
        })
        .await
    }

    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>> {
        self.timed("MGET", async {
            let mut store = self.store.lock().await;
            strings::mget(&mut store, keys)
        })
        .await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("INCRBY", async {
            let mut store = self.store.lock().await;
            strings::incr_by(&mut store, key, delta)
        })
        .await
    }

    async fn decr_by(&self, key: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("DECRBY", async {
            let mut store = self.store.lock().await;
            strings::decr_by(&mut store, key, delta)
        })
        .await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> AdapterResult<bool> {
        self.timed("HSET", async {
            let mut store = self.store.lock().await;
            hashes::hset(&mut store, key, field, value)
        })
        .await
    }

    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> AdapterResult<()> {
        self.timed("HMSET", async {
            let mut store = self.store.lock().await;
            hashes::hmset(&mut store, key, fields)
        })
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> AdapterResult<Option<String>> {
        self.timed("HGET", async {
            let mut store = self.store.lock().await;
            hashes::hget(&mut store, key, field)
        })
        .await
    }

    async fn hgetall(&self, key: &str) -> AdapterResult<Vec<(String, String)>> {
        self.timed("HGETALL", async {
            let mut store = self.store.lock().await;
            hashes::hgetall(&mut store, key)
        })
        .await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> AdapterResult<Vec<Option<String>>> {
        self.timed("HMGET", async {
            let mut store = self.store.lock().await;
            hashes::hmget(&mut store, key, fields)
        })
        .await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AdapterResult<i64> {
        self.timed("HDEL", async {
            let mut store = self.store.lock().await;
            hashes::hdel(&mut store, key, fields)
        })
        .await
    }

    async fn hexists(&self, key: &str, field: &str) -> AdapterResult<bool> {
        self.timed("HEXISTS", async {
            let mut store = self.store.lock().await;
            hashes::hexists(&mut store, key, field)
        })
        .await
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("HINCRBY", async {
            let mut store = self.store.lock().await;
            hashes::hincrby(&mut store, key, field, delta)
        })
        .await
    }

    async fn hlen(&self, key: &str) -> AdapterResult<i64> {
        self.timed("HLEN", async {
            let mut store = self.store.lock().await;
            hashes::hlen(&mut store, key)
        })
        .await
    }

    async fn lpush(&self, key: &str, values: &[String]) -> AdapterResult<i64> {
        self.timed("LPUSH", async {
            let mut store = self.store.lock().await;
            lists::lpush(&mut store, key, values)
        })
        .await
    }

    async fn rpush(&self, key: &str, values: &[String]) -> AdapterResult<i64> {
        self.timed("RPUSH", async {
            let mut store = self.store.lock().await;
            lists::rpush(&mut store, key, values)
        })
        .await
    }

    async fn lpop(&self, key: &str) -> AdapterResult<Option<String>> {
        self.timed("LPOP", async {
            let mut store = self.store.lock().await;
            lists::lpop(&mut store, key)
        })
        .await
    }

    async fn rpop(&self, key: &str) -> AdapterResult<Option<String>> {
        self.timed("RPOP", async {
            let mut store = self.store.lock().await;
            lists::rpop(&mut store, key)
        })
        .await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<String>> {
        self.timed("LRANGE", async {
            let mut store = self.store.lock().await;
            lists::lrange(&mut store, key, start, stop)
        })
        .await
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> AdapterResult<()> {
        self.timed("LTRIM", async {
            let mut store = self.store.lock().await;
            lists::ltrim(&mut store, key, start, stop)
        })
        .await
    }

    async fn lindex(&self, key: &str, index: i64) -> AdapterResult<Option<String>> {
        self.timed("LINDEX", async {
            let mut store = self.store.lock().await;
            lists::lindex(&mut store, key, index)
        })
        .await
    }

    async fn lset(&self, key: &str, index: i64, value: &str) -> AdapterResult<()> {
        self.timed("LSET", async {
            let mut store = self.store.lock().await;
            lists::lset(&mut store, key, index, value)
        })
        .await
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> AdapterResult<i64> {
        self.timed("LREM", async {
            let mut store = self.store.lock().await;
            lists::lrem(&mut store, key, count, value)
        })
        .await
    }

    async fn lpos(&self, key: &str, value: &str) -> AdapterResult<Option<i64>> {
        self.timed("LPOS", async {
            let mut store = self.store.lock().await;
            lists::lpos(&mut store, key, value)
        })
        .await
    }

    async fn linsert(&self, key: &str, before: bool, pivot: &str, value: &str) -> AdapterResult<i64> {
        self.timed("LINSERT", async {
            let mut store = self.store.lock().await;
            lists::linsert(&mut store, key, before, pivot, value)
        })
        .await
    }

    async fn sadd(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("SADD", async {
            let mut store = self.store.lock().await;
            sets::sadd(&mut store, key, members)
        })
        .await
    }

    async fn srem(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("SREM", async {
            let mut store = self.store.lock().await;
            sets::srem(&mut store, key, members)
        })
        .await
    }

    async fn smembers(&self, key: &str) -> AdapterResult<Vec<String>> {
        self.timed("SMEMBERS", async {
            let mut store = self.store.lock().await;
            sets::smembers(&mut store, key)
        })
        .await
    }

    async fn sismember(&self, key: &str, member: &str) -> AdapterResult<bool> {
        self.timed("SISMEMBER", async {
            let mut store = self.store.lock().await;
            sets::sismember(&mut store, key, member)
        })
        .await
    }

    async fn scard(&self, key: &str) -> AdapterResult<i64> {
        self.timed("SCARD", async {
            let mut store = self.store.lock().await;
            sets::scard(&mut store, key)
        })
        .await
    }

    async fn sinter(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SINTER", async {
            let mut store = self.store.lock().await;
            sets::sinter(&mut store, keys)
        })
        .await
    }

    async fn sunion(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SUNION", async {
            let mut store = self.store.lock().await;
            sets::sunion(&mut store, keys)
        })
        .await
    }

    async fn sdiff(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SDIFF", async {
            let mut store = self.store.lock().await;
            sets::sdiff(&mut store, keys)
        })
        .await
    }

    async fn zadd(&self, key: &str, members: &[(f64, String)], opts: ZAddOptions) -> AdapterResult<i64> {
        self.timed("ZADD", async {
            let mut store = self.store.lock().await;
            sorted_set::zadd(&mut store, key, members, opts)
        })
        .await
    }

    async fn zrem(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("ZREM", async {
            let mut store = self.store.lock().await;
            sorted_set::zrem(&mut store, key, members)
        })
        .await
    }

    async fn zscore(&self, key: &str, member: &str) -> AdapterResult<Option<f64>> {
        self.timed("ZSCORE", async {
            let mut store = self.store.lock().await;
            sorted_set::zscore(&mut store, key, member)
        })
        .await
    }

    async fn zrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>> {
        self.timed("ZRANK", async {
            let mut store = self.store.lock().await;
            sorted_set::zrank(&mut store, key, member)
        })
        .await
    }

    async fn zrevrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>> {
        self.timed("ZREVRANK", async {
            let mut store = self.store.lock().await;
            sorted_set::zrevrank(&mut store, key, member)
        })
        .await
    }

    async fn zcard(&self, key: &str) -> AdapterResult<i64> {
        self.timed("ZCARD", async {
            let mut store = self.store.lock().await;
            sorted_set::zcard(&mut store, key)
        })
        .await
    }

    async fn zcount(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64> {
        self.timed("ZCOUNT", async {
            let mut store = self.store.lock().await;
            sorted_set::zcount(&mut store, key, min, max)
        })
        .await
    }

    async fn zincrby(&self, key: &str, delta: f64, member: &str) -> AdapterResult<f64> {
        self.timed("ZINCRBY", async {
            let mut store = self.store.lock().await;
            sorted_set::zincrby(&mut store, key, delta, member)
        })
        .await
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZRANGE", async {
            let mut store = self.store.lock().await;
            sorted_set::zrange(&mut store, key, start, stop)
        })
        .await
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZREVRANGE", async {
            let mut store = self.store.lock().await;
            sorted_set::zrevrange(&mut store, key, start, stop)
        })
        .await
    }

    async fn zrangebyscore(
        &self,
        key: &str,
        min: &str,
        max: &str,
        limit: Option<(i64, i64)>,
    ) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZRANGEBYSCORE", async {
            let mut store = self.store.lock().await;
            sorted_set::zrangebyscore(&mut store, key, min, max, limit)
        })
        .await
    }

    async fn zrevrangebyscore(
        &self,
        key: &str,
        max: &str,
        min: &str,
        limit: Option<(i64, i64)>,
    ) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZREVRANGEBYSCORE", async {
            let mut store = self.store.lock().await;
            sorted_set::zrevrangebyscore(&mut store, key, max, min, limit)
        })
        .await
    }

    async fn zremrangebyrank(&self, key: &str, start: i64, stop: i64) -> AdapterResult<i64> {
        self.timed("ZREMRANGEBYRANK", async {
            let mut store = self.store.lock().await;
            sorted_set::zremrangebyrank(&mut store, key, start, stop)
        })
        .await
    }

    async fn zremrangebyscore(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64> {
        self.timed("ZREMRANGEBYSCORE", async {
            let mut store = self.store.lock().await;
            sorted_set::zremrangebyscore(&mut store, key, min, max)
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("DEL", async {
            let mut store = self.store.lock().await;
            keys::del(&mut store, keys)
        })
        .await
    }

    async fn exists(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("EXISTS", async {
            let mut store = self.store.lock().await;
            keys::exists(&mut store, keys)
        })
        .await
    }

    async fn expire(&self, key: &str, seconds: u64) -> AdapterResult<bool> {
        self.timed("EXPIRE", async {
            let mut store = self.store.lock().await;
            keys::expire(&mut store, key, seconds)
        })
        .await
    }

    async fn expire_at(&self, key: &str, unix_seconds: i64) -> AdapterResult<bool> {
        self.timed("EXPIREAT", async {
            let mut store = self.store.lock().await;
            keys::expire_at(&mut store, key, unix_seconds)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> AdapterResult<i64> {
        self.timed("TTL", async {
            let mut store = self.store.lock().await;
            keys::ttl(&mut store, key)
        })
        .await
    }

    async fn pttl(&self, key: &str) -> AdapterResult<i64> {
        self.timed("PTTL", async {
            let mut store = self.store.lock().await;
            keys::pttl(&mut store, key)
        })
        .await
    }

    async fn persist(&self, key: &str) -> AdapterResult<bool> {
        self.timed("PERSIST", async {
            let mut store = self.store.lock().await;
            keys::persist(&mut store, key)
        })
        .await
    }

    async fn rename(&self, src: &str, dst: &str) -> AdapterResult<()> {
        self.timed("RENAME", async {
            let mut store = self.store.lock().await;
            keys::rename(&mut store, src, dst)
        })
        .await
    }

    async fn key_type(&self, key: &str) -> AdapterResult<DataType> {
        self.timed("TYPE", async {
            let mut store = self.store.lock().await;
            keys::key_type(&mut store, key)
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> AdapterResult<Vec<String>> {
        self.timed("KEYS", async {
            let mut store = self.store.lock().await;
            keys::keys(&mut store, pattern)
        })
        .await
    }

    async fn scan(&self, cursor: u64, opts: ScanOptions) -> AdapterResult<ScanPage> {
        self.timed("SCAN", async {
            let mut store = self.store.lock().await;
            keys::scan(&mut store, cursor, opts)
        })
        .await
    }

    async fn pfadd(&self, key: &str, elements: &[String]) -> AdapterResult<bool> {
        self.timed("PFADD", async {
            let mut store = self.store.lock().await;
            hll_bloom::pfadd(&mut store, key, elements)
        })
        .await
    }

    async fn pfcount(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("PFCOUNT", async {
            let mut store = self.store.lock().await;
            hll_bloom::pfcount(&mut store, keys)
        })
        .await
    }

    async fn pfmerge(&self, dest: &str, sources: &[String]) -> AdapterResult<()> {
        self.timed("PFMERGE", async {
            let mut store = self.store.lock().await;
            hll_bloom::pfmerge(&mut store, dest, sources)
        })
        .await
    }

    async fn bf_reserve(&self, key: &str, error_rate: f64, capacity: u64) -> AdapterResult<()> {
        self.timed("BF.RESERVE", async {
            let mut store = self.store.lock().await;
            hll_bloom::bf_reserve(&mut store, key, error_rate, capacity)
        })
        .await
    }

    async fn bf_add(&self, key: &str, item: &str) -> AdapterResult<bool> {
        self.timed("BF.ADD", async {
            let mut store = self.store.lock().await;
            hll_bloom::bf_add(&mut store, key, item)
        })
        .await
    }

    async fn bf_madd(&self, key: &str, items: &[String]) -> AdapterResult<Vec<bool>> {
        self.timed("BF.MADD", async {
            let mut store = self.store.lock().await;
            hll_bloom::bf_madd(&mut store, key, items)
        })
        .await
    }

    async fn bf_exists(&self, key: &str, item: &str) -> AdapterResult<bool> {
        self.timed("BF.EXISTS", async {
            let mut store = self.store.lock().await;
            hll_bloom::bf_exists(&mut store, key, item)
        })
        .await
    }

    async fn bf_mexists(&self, key: &str, items: &[String]) -> AdapterResult<Vec<bool>> {
        self.timed("BF.MEXISTS", async {
            let mut store = self.store.lock().await;
            hll_bloom::bf_mexists(&mut store, key, items)
        })
        .await
    }

    async fn xadd(&self, key: &str, id: &str, fields: &[(String, String)]) -> AdapterResult<String> {
        self.timed("XADD", async {
            let mut store = self.store.lock().await;
            streams::xadd(&mut store, key, id, fields)
        })
        .await
    }

    async fn xrange(
        &self,
        key: &str,
        start: &str,
        end: &str,
        count: Option<u64>,
    ) -> AdapterResult<Vec<StreamRecord>> {
        self.timed("XRANGE", async {
            let mut store = self.store.lock().await;
            streams::xrange(&mut store, key, start, end, count)
        })
        .await
    }

    async fn xrevrange(
        &self,
        key: &str,
        end: &str,
        start: &str,
        count: Option<u64>,
    ) -> AdapterResult<Vec<StreamRecord>> {
        self.timed("XREVRANGE", async {
            let mut store = self.store.lock().await;
            streams::xrevrange(&mut store, key, end, start, count)
        })
        .await
    }

    async fn xlen(&self, key: &str) -> AdapterResult<i64> {
        self.timed("XLEN", async {
            let mut store = self.store.lock().await;
            streams::xlen(&mut store, key)
        })
        .await
    }

    async fn xtrim(
        &self,
        key: &str,
        strategy: TrimStrategy,
        threshold: &str,
        approximate: bool,
    ) -> AdapterResult<i64> {
        self.timed("XTRIM", async {
            let mut store = self.store.lock().await;
            streams::xtrim(&mut store, key, strategy, threshold, approximate)
        })
        .await
    }

    async fn xdel(&self, key: &str, ids: &[String]) -> AdapterResult<i64> {
        self.timed("XDEL", async {
            let mut store = self.store.lock().await;
            streams::xdel(&mut store, key, ids)
        })
        .await
    }

    /// Explicit static dispatch table over [`Command`]:
    /// used by the pipeline, transaction, and action-engine paths, which
    /// hold commands and args generically and cannot call a named method.
    async fn dispatch(&self, command: Command, args: &[CommandArg]) -> AdapterResult<RawValue> {
        match command {
            Command::Set => {
                let outcome = self.set(&arg_key(args, 0)?, &arg_str(args, 1)?, set_options_from_args(args, 2)).await?;
                Ok(match outcome {
                    SetOutcome::Ok => RawValue::Ok,
                    SetOutcome::Aborted => RawValue::Nil,
                })
            }
            Command::Get => Ok(opt_string_to_raw(self.get(&arg_key(args, 0)?).await?)),
            Command::Incr => Ok(RawValue::Integer(self.incr_by(&arg_key(args, 0)?, 1).await?)),
            Command::IncrBy => Ok(RawValue::Integer(self.incr_by(&arg_key(args, 0)?, arg_int(args, 1)?).await?)),
            Command::Decr => Ok(RawValue::Integer(self.decr_by(&arg_key(args, 0)?, 1).await?)),
            Command::DecrBy => Ok(RawValue::Integer(self.decr_by(&arg_key(args, 0)?, arg_int(args, 1)?).await?)),
            Command::MSet => {
                let pairs: Vec<(String, String)> = args.chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].to_string(), c[1].to_string())).collect();
                self.mset(&pairs).await?;
                Ok(RawValue::Ok)
            }
            Command::MGet => {
                let keys: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                Ok(RawValue::Array(self.mget(&keys).await?.into_iter().map(opt_string_to_raw).collect()))
            }
            Command::HSet => Ok(RawValue::Boolean(self.hset(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?).await?)),
            Command::HGet => Ok(opt_string_to_raw(self.hget(&arg_key(args, 0)?, &arg_str(args, 1)?).await?)),
            Command::HGetAll => {
                let pairs = self.hgetall(&arg_key(args, 0)?).await?;
                Ok(RawValue::Array(pairs.into_iter().flat_map(|(k, v)| [RawValue::Bulk(k), RawValue::Bulk(v)]).collect()))
            }
            Command::HDel => Ok(RawValue::Integer(self.hdel(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::HExists => Ok(RawValue::Boolean(self.hexists(&arg_key(args, 0)?, &arg_str(args, 1)?).await?)),
            Command::HIncrBy => Ok(RawValue::Integer(self.hincrby(&arg_key(args, 0)?, &arg_str(args, 1)?, arg_int(args, 2)?).await?)),
            Command::HLen => Ok(RawValue::Integer(self.hlen(&arg_key(args, 0)?).await?)),
            Command::HMSet => {
                let fields: Vec<(String, String)> = args[1..].chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].to_string(), c[1].to_string())).collect();
                self.hmset(&arg_key(args, 0)?, &fields).await?;
                Ok(RawValue::Ok)
            }
            Command::HMGet => {
                let fields = rest_as_strings(args, 1);
                Ok(RawValue::Array(self.hmget(&arg_key(args, 0)?, &fields).await?.into_iter().map(opt_string_to_raw).collect()))
            }
            Command::LPush => Ok(RawValue::Integer(self.lpush(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::RPush => Ok(RawValue::Integer(self.rpush(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::LPop => Ok(opt_string_to_raw(self.lpop(&arg_key(args, 0)?).await?)),
            Command::RPop => Ok(opt_string_to_raw(self.rpop(&arg_key(args, 0)?).await?)),
            Command::LRange => Ok(strings_to_raw(self.lrange(&arg_key(args, 0)?, arg_int(args, 1)?, arg_int(args, 2)?).await?)),
            Command::LTrim => {
                self.ltrim(&arg_key(args, 0)?, arg_int(args, 1)?, arg_int(args, 2)?).await?;
                Ok(RawValue::Ok)
            }
            Command::LIndex => Ok(opt_string_to_raw(self.lindex(&arg_key(args, 0)?, arg_int(args, 1)?).await?)),
            Command::LSet => {
                self.lset(&arg_key(args, 0)?, arg_int(args, 1)?, &arg_str(args, 2)?).await?;
                Ok(RawValue::Ok)
            }
            Command::LRem => Ok(RawValue::Integer(self.lrem(&arg_key(args, 0)?, arg_int(args, 1)?, &arg_str(args, 2)?).await?)),
            Command::LPos => Ok(self.lpos(&arg_key(args, 0)?, &arg_str(args, 1)?).await?.map(RawValue::Integer).unwrap_or(RawValue::Nil)),
            Command::LInsert => {
                let before = arg_str(args, 1)?.eq_ignore_ascii_case("before");
                Ok(RawValue::Integer(self.linsert(&arg_key(args, 0)?, before, &arg_str(args, 2)?, &arg_str(args, 3)?).await?))
            }
            Command::SAdd => Ok(RawValue::Integer(self.sadd(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::SRem => Ok(RawValue::Integer(self.srem(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::SMembers => Ok(strings_to_raw(self.smembers(&arg_key(args, 0)?).await?)),
            Command::SIsMember => Ok(RawValue::Boolean(self.sismember(&arg_key(args, 0)?, &arg_str(args, 1)?).await?)),
            Command::SCard => Ok(RawValue::Integer(self.scard(&arg_key(args, 0)?).await?)),
            Command::SInter => Ok(strings_to_raw(self.sinter(&rest_as_strings(args, 0)).await?)),
            Command::SUnion => Ok(strings_to_raw(self.sunion(&rest_as_strings(args, 0)).await?)),
            Command::SDiff => Ok(strings_to_raw(self.sdiff(&rest_as_strings(args, 0)).await?)),
            Command::ZAdd => {
                let pairs: Vec<(f64, String)> = args[1..]
                    .chunks(2)
                    .filter(|c| c.len() == 2)
                    .map(|c| Ok::<_, CommandError>((c[0].to_string().parse().map_err(|_| CommandError::Command("invalid score".into()))?, c[1].to_string())))
                    .collect::<Result<_, _>>()?;
                Ok(RawValue::Integer(self.zadd(&arg_key(args, 0)?, &pairs, ZAddOptions::default()).await?))
            }
            Command::ZRem => Ok(RawValue::Integer(self.zrem(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::ZScore => Ok(self.zscore(&arg_key(args, 0)?, &arg_str(args, 1)?).await?.map(RawValue::Double).unwrap_or(RawValue::Nil)),
            Command::ZRank => Ok(self.zrank(&arg_key(args, 0)?, &arg_str(args, 1)?).await?.map(RawValue::Integer).unwrap_or(RawValue::Nil)),
            Command::ZRevRank => Ok(self.zrevrank(&arg_key(args, 0)?, &arg_str(args, 1)?).await?.map(RawValue::Integer).unwrap_or(RawValue::Nil)),
            Command::ZCard => Ok(RawValue::Integer(self.zcard(&arg_key(args, 0)?).await?)),
            Command::ZCount => Ok(RawValue::Integer(self.zcount(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?).await?)),
            Command::ZIncrBy => Ok(RawValue::Double(self.zincrby(&arg_key(args, 0)?, arg_float(args, 1)?, &arg_str(args, 2)?).await?)),
            Command::ZRange => Ok(member_scores_to_raw(self.zrange(&arg_key(args, 0)?, arg_int(args, 1)?, arg_int(args, 2)?).await?)),
            Command::ZRevRange => Ok(member_scores_to_raw(self.zrevrange(&arg_key(args, 0)?, arg_int(args, 1)?, arg_int(args, 2)?).await?)),
            Command::ZRangeByScore => Ok(member_scores_to_raw(self.zrangebyscore(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?, None).await?)),
            Command::ZRevRangeByScore => Ok(member_scores_to_raw(self.zrevrangebyscore(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?, None).await?)),
            Command::ZRemRangeByRank => Ok(RawValue::Integer(self.zremrangebyrank(&arg_key(args, 0)?, arg_int(args, 1)?, arg_int(args, 2)?).await?)),
            Command::ZRemRangeByScore => Ok(RawValue::Integer(self.zremrangebyscore(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?).await?)),
            Command::Del => Ok(RawValue::Integer(self.del(&rest_as_strings(args, 0)).await?)),
            Command::Exists => Ok(RawValue::Integer(self.exists(&rest_as_strings(args, 0)).await?)),
            Command::Expire => Ok(RawValue::Boolean(self.expire(&arg_key(args, 0)?, arg_int(args, 1)? as u64).await?)),
            Command::ExpireAt => Ok(RawValue::Boolean(self.expire_at(&arg_key(args, 0)?, arg_int(args, 1)?).await?)),
            Command::Ttl => Ok(RawValue::Integer(self.ttl(&arg_key(args, 0)?).await?)),
            Command::Pttl => Ok(RawValue::Integer(self.pttl(&arg_key(args, 0)?).await?)),
            Command::Persist => Ok(RawValue::Boolean(self.persist(&arg_key(args, 0)?).await?)),
            Command::Rename => {
                self.rename(&arg_key(args, 0)?, &arg_key(args, 1)?).await?;
                Ok(RawValue::Ok)
            }
            Command::Type => Ok(RawValue::Bulk(self.key_type(&arg_key(args, 0)?).await?.as_type_literal().to_string())),
            Command::Keys => Ok(strings_to_raw(self.keys(&arg_str(args, 0)?).await?)),
            Command::Scan => {
                let cursor = arg_int(args, 0)? as u64;
                let page = self.scan(cursor, ScanOptions::default()).await?;
                Ok(RawValue::Array(vec![
                    RawValue::Bulk(page.next_cursor.to_string()),
                    strings_to_raw(page.keys),
                ]))
            }
            Command::PfAdd => Ok(RawValue::Boolean(self.pfadd(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::PfCount => Ok(RawValue::Integer(self.pfcount(&rest_as_strings(args, 0)).await?)),
            Command::PfMerge => {
                self.pfmerge(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?;
                Ok(RawValue::Ok)
            }
            Command::BfReserve => {
                self.bf_reserve(&arg_key(args, 0)?, arg_float(args, 1)?, arg_int(args, 2)? as u64).await?;
                Ok(RawValue::Ok)
            }
            Command::BfAdd => Ok(RawValue::Boolean(self.bf_add(&arg_key(args, 0)?, &arg_str(args, 1)?).await?)),
            Command::BfMAdd => Ok(RawValue::Array(self.bf_madd(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?.into_iter().map(RawValue::Boolean).collect())),
            Command::BfExists => Ok(RawValue::Boolean(self.bf_exists(&arg_key(args, 0)?, &arg_str(args, 1)?).await?)),
            Command::BfMExists => Ok(RawValue::Array(self.bf_mexists(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?.into_iter().map(RawValue::Boolean).collect())),
            Command::XAdd => {
                let fields: Vec<(String, String)> = args[2..].chunks(2).filter(|c| c.len() == 2).map(|c| (c[0].to_string(), c[1].to_string())).collect();
                Ok(RawValue::Bulk(self.xadd(&arg_key(args, 0)?, &arg_str(args, 1)?, &fields).await?))
            }
            Command::XRange => {
                let count = args.get(3).map(|_| arg_int(args, 3)).transpose()?.map(|n| n as u64);
                let records = self.xrange(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?, count).await?;
                Ok(stream_records_to_raw(records))
            }
            Command::XRevRange => {
                let count = args.get(3).map(|_| arg_int(args, 3)).transpose()?.map(|n| n as u64);
                let records = self.xrevrange(&arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?, count).await?;
                Ok(stream_records_to_raw(records))
            }
            Command::XLen => Ok(RawValue::Integer(self.xlen(&arg_key(args, 0)?).await?)),
            Command::XTrim => {
                let strategy = if arg_str(args, 1)?.eq_ignore_ascii_case("minid") { TrimStrategy::MinId } else { TrimStrategy::MaxLen };
                Ok(RawValue::Integer(self.xtrim(&arg_key(args, 0)?, strategy, &arg_str(args, 2)?, false).await?))
            }
            Command::XDel => Ok(RawValue::Integer(self.xdel(&arg_key(args, 0)?, &rest_as_strings(args, 1)).await?)),
            Command::XRead => Err(CommandError::NotSupported("XREAD (blocking reads are out of scope for the in-process adapter)")),
        }
    }

    async fn execute_transaction(&self, entries: &[PipelineEntry]) -> TransactionOutcome {
        // The whole-store mutex already serializes this transaction against
        // concurrent writers. Commands are staged against a scratch clone of
        // the store first; only once every entry has succeeded does the
        // scratch copy replace the live one, so a failing entry leaves no
        // partial writes visible.
        let mut store = self.store.lock().await;
        let mut staging = store.clone();
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            match dispatch_locked(&mut staging, entry.command, &entry.args) {
                Ok(value) => results.push(value),
                Err(e) => return TransactionOutcome::aborted(e.to_string()),
            }
        }
        *store = staging;
        TransactionOutcome::committed(results)
    }

    async fn stats(&self) -> AdapterResult<CacheStats> {
        let mut stats = self.metrics.stats();
        let store = self.store.lock().await;
        stats.size = store.entries.len() as u64;
        Ok(stats)
    }

    async fn reset_stats(&self) {
        self.metrics.reset();
    }
}

fn stream_records_to_raw(records: Vec<StreamRecord>) -> RawValue {
    RawValue::Array(
        records
            .into_iter()
            .map(|r| {
                RawValue::Array(vec![
                    RawValue::Bulk(r.id),
                    RawValue::Array(r.fields.into_iter().flat_map(|(k, v)| [RawValue::Bulk(k), RawValue::Bulk(v)]).collect()),
                ])
            })
            .collect(),
    )
}

/// Synchronous re-dispatch used only inside [`InProcessAdapter::execute_transaction`],
/// where the store mutex is already held and calling back through the
/// async, self-locking `dispatch` would deadlock.
fn dispatch_locked(store: &mut Store, command: Command, args: &[CommandArg]) -> Result<RawValue, CommandError> {
    match command {
        Command::Set => {
            let outcome = strings::set(store, &arg_key(args, 0)?, &arg_str(args, 1)?, set_options_from_args(args, 2))?;
            Ok(match outcome {
                SetOutcome::Ok => RawValue::Ok,
                SetOutcome::Aborted => RawValue::Nil,
            })
        }
        Command::Get => Ok(opt_string_to_raw(strings::get(store, &arg_key(args, 0)?)?)),
        Command::Incr => Ok(RawValue::Integer(strings::incr_by(store, &arg_key(args, 0)?, 1)?)),
        Command::IncrBy => Ok(RawValue::Integer(strings::incr_by(store, &arg_key(args, 0)?, arg_int(args, 1)?)?)),
        Command::Decr => Ok(RawValue::Integer(strings::decr_by(store, &arg_key(args, 0)?, 1)?)),
        Command::DecrBy => Ok(RawValue::Integer(strings::decr_by(store, &arg_key(args, 0)?, arg_int(args, 1)?)?)),
        Command::HSet => Ok(RawValue::Boolean(hashes::hset(store, &arg_key(args, 0)?, &arg_str(args, 1)?, &arg_str(args, 2)?)?)),
        Command::HGet => Ok(opt_string_to_raw(hashes::hget(store, &arg_key(args, 0)?, &arg_str(args, 1)?)?)),
        Command::HDel => Ok(RawValue::Integer(hashes::hdel(store, &arg_key(args, 0)?, &rest_as_strings(args, 1))?)),
        Command::LPush => Ok(RawValue::Integer(lists::lpush(store, &arg_key(args, 0)?, &rest_as_strings(args, 1))?)),
        Command::RPush => Ok(RawValue::Integer(lists::rpush(store, &arg_key(args, 0)?, &rest_as_strings(args, 1))?)),
        Command::SAdd => Ok(RawValue::Integer(sets::sadd(store, &arg_key(args, 0)?, &rest_as_strings(args, 1))?)),
        Command::SRem => Ok(RawValue::Integer(sets::srem(store, &arg_key(args, 0)?, &rest_as_strings(args, 1))?)),
        Command::ZIncrBy => Ok(RawValue::Double(sorted_set::zincrby(store, &arg_key(args, 0)?, arg_float(args, 1)?, &arg_str(args, 2)?)?)),
        Command::Del => Ok(RawValue::Integer(keys::del(store, &rest_as_strings(args, 0))?)),
        Command::Expire => Ok(RawValue::Boolean(keys::expire(store, &arg_key(args, 0)?, arg_int(args, 1)? as u64)?)),
        other => Err(CommandError::Command(format!(
            "{} is not supported inside a transaction on the in-process adapter",
            other.name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let adapter = InProcessAdapter::new();
        adapter.set("k", "v", SetOptions::default()).await.unwrap();
        assert_eq!(adapter.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn transaction_aborts_without_partial_writes() {
        let adapter = InProcessAdapter::new();
        adapter.set("k", "orig", SetOptions::default()).await.unwrap();
        let entries = vec![
            PipelineEntry::new(Command::Set, vec![CommandArg::Key("k".into()), CommandArg::Str("new".into())]),
            PipelineEntry::new(Command::HGet, vec![CommandArg::Key("k".into()), CommandArg::Str("f".into())]),
        ];
        let outcome = adapter.execute_transaction(&entries).await;
        assert!(!outcome.success);
        assert_eq!(adapter.get("k").await.unwrap(), Some("orig".to_string()));
    }

    #[tokio::test]
    async fn dispatch_matches_typed_method_for_get() {
        let adapter = InProcessAdapter::new();
        adapter.set("k", "v", SetOptions::default()).await.unwrap();
        let raw = adapter.dispatch(Command::Get, &[CommandArg::Key("k".into())]).await.unwrap();
        assert_eq!(raw.as_bulk(), Some("v"));
    }
}
