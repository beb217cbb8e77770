//! The uniform Adapter contract.
//!
//! Capabilities are grouped by data structure. The contract is identical
//! across every implementation; optional groups (streams, HyperLogLog, Bloom,
//! pub/sub, scripting) are gated behind capability probes rather than a
//! runtime `AdapterNotSupported` surprise deep in a call path.

use async_trait::async_trait;
use corecache_core::{CacheStats, Command, CommandArg, CommandError, DataType, RawValue};

use crate::options::{ScanOptions, SetOptions, SetOutcome, TrimStrategy, ZAddOptions};
use crate::pipeline::{PipelineEntry, PipelineOutcome, StreamRecord, TransactionOutcome};

pub type AdapterResult<T> = Result<T, CommandError>;

/// `{nextCursor, keys}` returned by `SCAN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub next_cursor: u64,
    pub keys: Vec<String>,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    // ------------------------------------------------------------------
    // Capability probes
    // ------------------------------------------------------------------
    fn supports_streams(&self) -> bool {
        false
    }
    fn supports_hyperloglog(&self) -> bool {
        false
    }
    fn supports_bloom(&self) -> bool {
        false
    }
    fn supports_script(&self) -> bool {
        false
    }
    fn supports_pubsub(&self) -> bool {
        false
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------
    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> AdapterResult<SetOutcome>;
    async fn get(&self, key: &str) -> AdapterResult<Option<String>>;
    async fn mset(&self, pairs: &[(String, String)]) -> AdapterResult<()>;
    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>>;
    async fn incr_by(&self, key: &str, delta: i64) -> AdapterResult<i64>;
    async fn decr_by(&self, key: &str, delta: i64) -> AdapterResult<i64>;

    // ------------------------------------------------------------------
    // Hashes
    // ------------------------------------------------------------------
    async fn hset(&self, key: &str, field: &str, value: &str) -> AdapterResult<bool>;
    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> AdapterResult<()>;
    async fn hget(&self, key: &str, field: &str) -> AdapterResult<Option<String>>;
    async fn hgetall(&self, key: &str) -> AdapterResult<Vec<(String, String)>>;
    async fn hmget(&self, key: &str, fields: &[String]) -> AdapterResult<Vec<Option<String>>>;
    async fn hdel(&self, key: &str, fields: &[String]) -> AdapterResult<i64>;
    async fn hexists(&self, key: &str, field: &str) -> AdapterResult<bool>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> AdapterResult<i64>;
    async fn hlen(&self, key: &str) -> AdapterResult<i64>;

    // ------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------
    async fn lpush(&self, key: &str, values: &[String]) -> AdapterResult<i64>;
    async fn rpush(&self, key: &str, values: &[String]) -> AdapterResult<i64>;
    async fn lpop(&self, key: &str) -> AdapterResult<Option<String>>;
    async fn rpop(&self, key: &str) -> AdapterResult<Option<String>>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<String>>;
    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> AdapterResult<()>;
    async fn lindex(&self, key: &str, index: i64) -> AdapterResult<Option<String>>;
    async fn lset(&self, key: &str, index: i64, value: &str) -> AdapterResult<()>;
    async fn lrem(&self, key: &str, count: i64, value: &str) -> AdapterResult<i64>;
    async fn lpos(&self, key: &str, value: &str) -> AdapterResult<Option<i64>>;
    async fn linsert(
        &self,
        key: &str,
        before: bool,
        pivot: &str,
        value: &str,
    ) -> AdapterResult<i64>;

    // ------------------------------------------------------------------
    // Sets
    // ------------------------------------------------------------------
    async fn sadd(&self, key: &str, members: &[String]) -> AdapterResult<i64>;
    async fn srem(&self, key: &str, members: &[String]) -> AdapterResult<i64>;
    async fn smembers(&self, key: &str) -> AdapterResult<Vec<String>>;
    async fn sismember(&self, key: &str, member: &str) -> AdapterResult<bool>;
    async fn scard(&self, key: &str) -> AdapterResult<i64>;
    async fn sinter(&self, keys: &[String]) -> AdapterResult<Vec<String>>;
    async fn sunion(&self, keys: &[String]) -> AdapterResult<Vec<String>>;
    async fn sdiff(&self, keys: &[String]) -> AdapterResult<Vec<String>>;

    // ------------------------------------------------------------------
    // Sorted sets. Adapters always return `(member, score)` pairs; whether a
    // caller surfaces the score is a presentation concern, not an adapter one.
    // ------------------------------------------------------------------
    async fn zadd(
        &self,
        key: &str,
        members: &[(f64, String)],
        opts: ZAddOptions,
    ) -> AdapterResult<i64>;
    async fn zrem(&self, key: &str, members: &[String]) -> AdapterResult<i64>;
    async fn zscore(&self, key: &str, member: &str) -> AdapterResult<Option<f64>>;
    async fn zrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>>;
    async fn zrevrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>>;
    async fn zcard(&self, key: &str) -> AdapterResult<i64>;
    async fn zcount(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64>;
    async fn zincrby(&self, key: &str, delta: f64, member: &str) -> AdapterResult<f64>;
    async fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> AdapterResult<Vec<(String, f64)>>;
    async fn zrevrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> AdapterResult<Vec<(String, f64)>>;
    async fn zrangebyscore(
        &self,
        key: &str,
        min: &str,
        max: &str,
        limit: Option<(i64, i64)>,
    ) -> AdapterResult<Vec<(String, f64)>>;
    async fn zrevrangebyscore(
        &self,
        key: &str,
        max: &str,
        min: &str,
        limit: Option<(i64, i64)>,
    ) -> AdapterResult<Vec<(String, f64)>>;
    async fn zremrangebyrank(&self, key: &str, start: i64, stop: i64) -> AdapterResult<i64>;
    async fn zremrangebyscore(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64>;

    // ------------------------------------------------------------------
    // Key management
    // ------------------------------------------------------------------
    async fn del(&self, keys: &[String]) -> AdapterResult<i64>;
    async fn exists(&self, keys: &[String]) -> AdapterResult<i64>;
    async fn expire(&self, key: &str, seconds: u64) -> AdapterResult<bool>;
    async fn expire_at(&self, key: &str, unix_seconds: i64) -> AdapterResult<bool>;
    async fn ttl(&self, key: &str) -> AdapterResult<i64>;
    async fn pttl(&self, key: &str) -> AdapterResult<i64>;
    async fn persist(&self, key: &str) -> AdapterResult<bool>;
    async fn rename(&self, src: &str, dst: &str) -> AdapterResult<()>;
    async fn key_type(&self, key: &str) -> AdapterResult<DataType>;
    async fn keys(&self, pattern: &str) -> AdapterResult<Vec<String>>;
    async fn scan(&self, cursor: u64, opts: ScanOptions) -> AdapterResult<ScanPage>;

    // ------------------------------------------------------------------
    // HyperLogLog (optional; default impls surface `NotSupported`)
    // ------------------------------------------------------------------
    async fn pfadd(&self, _key: &str, _elements: &[String]) -> AdapterResult<bool> {
        Err(CommandError::NotSupported("hyperloglog"))
    }
    async fn pfcount(&self, _keys: &[String]) -> AdapterResult<i64> {
        Err(CommandError::NotSupported("hyperloglog"))
    }
    async fn pfmerge(&self, _dest: &str, _sources: &[String]) -> AdapterResult<()> {
        Err(CommandError::NotSupported("hyperloglog"))
    }

    // ------------------------------------------------------------------
    // Bloom filter (optional)
    // ------------------------------------------------------------------
    async fn bf_reserve(&self, _key: &str, _error_rate: f64, _capacity: u64) -> AdapterResult<()> {
        Err(CommandError::NotSupported("bloom"))
    }
    async fn bf_add(&self, _key: &str, _item: &str) -> AdapterResult<bool> {
        Err(CommandError::NotSupported("bloom"))
    }
    async fn bf_madd(&self, _key: &str, _items: &[String]) -> AdapterResult<Vec<bool>> {
        Err(CommandError::NotSupported("bloom"))
    }
    async fn bf_exists(&self, _key: &str, _item: &str) -> AdapterResult<bool> {
        Err(CommandError::NotSupported("bloom"))
    }
    async fn bf_mexists(&self, _key: &str, _items: &[String]) -> AdapterResult<Vec<bool>> {
        Err(CommandError::NotSupported("bloom"))
    }

    // ------------------------------------------------------------------
    // Streams (optional)
    // ------------------------------------------------------------------
    async fn xadd(
        &self,
        _key: &str,
        _id: &str,
        _fields: &[(String, String)],
    ) -> AdapterResult<String> {
        Err(CommandError::NotSupported("streams"))
    }
    async fn xrange(
        &self,
        _key: &str,
        _start: &str,
        _end: &str,
        _count: Option<u64>,
    ) -> AdapterResult<Vec<StreamRecord>> {
        Err(CommandError::NotSupported("streams"))
    }
    async fn xrevrange(
        &self,
        _key: &str,
        _end: &str,
        _start: &str,
        _count: Option<u64>,
    ) -> AdapterResult<Vec<StreamRecord>> {
        Err(CommandError::NotSupported("streams"))
    }
    async fn xlen(&self, _key: &str) -> AdapterResult<i64> {
        Err(CommandError::NotSupported("streams"))
    }
    async fn xtrim(
        &self,
        _key: &str,
        _strategy: TrimStrategy,
        _threshold: &str,
        _approximate: bool,
    ) -> AdapterResult<i64> {
        Err(CommandError::NotSupported("streams"))
    }
    async fn xdel(&self, _key: &str, _ids: &[String]) -> AdapterResult<i64> {
        Err(CommandError::NotSupported("streams"))
    }

    // ------------------------------------------------------------------
    // Pipeline / transaction / script
    // ------------------------------------------------------------------

    /// Generic single-command dispatch used by the pipeline/transaction/
    /// action-engine paths, which operate on heterogeneous commands they
    /// cannot call named Rust methods for. Implemented as one explicit
    /// `match` over [`Command`] per adapter, not by string lookup.
    async fn dispatch(&self, command: Command, args: &[CommandArg]) -> AdapterResult<RawValue>;

    /// Submit entries together; per-entry failures do not short-circuit the
    /// rest. The default implementation runs entries
    /// sequentially through `dispatch` — this is also the documented
    /// fallback the Cache Facade uses for adapters without a native batched
    /// path.
    async fn execute_pipeline(&self, entries: &[PipelineEntry]) -> Vec<PipelineOutcome> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let result = self.dispatch(entry.command, &entry.args).await;
            out.push(PipelineOutcome::from_result(result));
        }
        out
    }

    /// All-or-nothing commit.
    async fn execute_transaction(&self, entries: &[PipelineEntry]) -> TransactionOutcome;

    /// Execute a server-side script atomically. Adapters without
    /// scripting support return `CommandError::NotSupported("script")`.
    async fn execute_script(
        &self,
        _script: &str,
        _keys: &[String],
        _args: &[CommandArg],
    ) -> AdapterResult<RawValue> {
        Err(CommandError::NotSupported("script"))
    }

    // ------------------------------------------------------------------
    // Pub/Sub (optional)
    // ------------------------------------------------------------------
    async fn publish(&self, _channel: &str, _message: &str) -> AdapterResult<i64> {
        Err(CommandError::NotSupported("pubsub"))
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------
    async fn stats(&self) -> AdapterResult<CacheStats>;
    async fn reset_stats(&self);
}
