//! The external (Redis-compatible) adapter.
//! Connection bootstrapping is out of scope: callers inject
//! an already-connected [`ConnectionManager`]. Commands go over
//! `redis::cmd(name).arg(...)`, mirroring the `redis::cmd("GET")` pattern
//! used for the L3 tier elsewhere in this codebase's history.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};
use tokio::sync::Mutex;

use corecache_core::{CacheStats, Command, CommandArg, CommandError, DataType, Metrics, RawValue};

use crate::adapter::{Adapter, AdapterResult, ScanPage};
use crate::options::{ScanOptions, SetOptions, SetOutcome, TrimStrategy, ZAddOptions};
use crate::pipeline::{PipelineEntry, StreamRecord, TransactionOutcome};

fn map_err(e: RedisError) -> CommandError {
    if e.is_timeout() {
        CommandError::Timeout(std::time::Duration::from_secs(0))
    } else if e.is_io_error() {
        CommandError::Connection(e.to_string())
    } else {
        CommandError::Command(e.to_string())
    }
}

/// Adapter backed by a live `redis` crate connection. Works against any
/// server speaking the Redis wire protocol.
pub struct RedisAdapter {
    conn: Mutex<ConnectionManager>,
    metrics: Metrics,
}

impl RedisAdapter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn: Mutex::new(conn), metrics: Metrics::new() }
    }

    async fn timed<T>(&self, name: &'static str, fut: impl std::future::Future<Output = AdapterResult<T>>) -> AdapterResult<T> {
        let start = std::time::Instant::now();
        let result = fut.await;
        self.metrics.record_command(name, start.elapsed().as_micros() as u64, result.is_err());
        result
    }
}

#[async_trait]
impl Adapter for RedisAdapter {
    fn supports_streams(&self) -> bool {
        true
    }
    fn supports_hyperloglog(&self) -> bool {
        true
    }
    fn supports_bloom(&self) -> bool {
        // The Bloom filter command family (`BF.*`) requires RedisBloom;
        // plain Redis servers do not carry it.
        false
    }
    fn supports_script(&self) -> bool {
        true
    }
    fn supports_pubsub(&self) -> bool {
        true
    }

    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> AdapterResult<SetOutcome> {
        self.timed("SET", async {
            let mut conn = self.conn.lock().await;
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(secs) = opts.ex {
                cmd.arg("EX").arg(secs);
            }
            if let Some(ms) = opts.px {
                cmd.arg("PX").arg(ms);
            }
            if opts.nx {
                cmd.arg("NX");
            }
            if opts.xx {
                cmd.arg("XX");
            }
            if opts.keep_ttl {
                cmd.arg("KEEPTTL");
            }
            let reply: Option<String> = cmd.query_async(&mut *conn).await.map_err(map_err)?;
            Ok(if reply.is_some() { SetOutcome::Ok } else { SetOutcome::Aborted })
        })
        .await
    }

    async fn get(&self, key: &str) -> AdapterResult<Option<String>> {
        let result = self
            .timed("GET", async {
                let mut conn = self.conn.lock().await;
                conn.get(key).await.map_err(map_err)
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
            let mut conn = self.conn.lock().await;
            conn.mset(pairs).await.map_err(map_err)
        })
        .await
    }

    async fn mget(&self, keys: &[String]) -> AdapterResult<Vec<Option<String>>> {
        self.timed("MGET", async {
            let mut conn = self.conn.lock().await;
            conn.mget(keys).await.map_err(map_err)
        })
        .await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("INCRBY", async {
            let mut conn = self.conn.lock().await;
            conn.incr(key, delta).await.map_err(map_err)
        })
        .await
    }

    async fn decr_by(&self, key: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("DECRBY", async {
            let mut conn = self.conn.lock().await;
            conn.decr(key, delta).await.map_err(map_err)
        })
        .await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> AdapterResult<bool> {
        self.timed("HSET", async {
            let mut conn = self.conn.lock().await;
            conn.hset(key, field, value).await.map_err(map_err)
        })
        .await
    }

    async fn hmset(&self, key: &str, fields: &[(String, String)]) -> AdapterResult<()> {
        self.timed("HMSET", async {
            let mut conn = self.conn.lock().await;
            conn.hset_multiple(key, fields).await.map_err(map_err)
        })
        .await
    }

    async fn hget(&self, key: &str, field: &str) -> AdapterResult<Option<String>> {
        self.timed("HGET", async {
            let mut conn = self.conn.lock().await;
            conn.hget(key, field).await.map_err(map_err)
        })
        .await
    }

    async fn hgetall(&self, key: &str) -> AdapterResult<Vec<(String, String)>> {
        self.timed("HGETALL", async {
            let mut conn = self.conn.lock().await;
            conn.hgetall(key).await.map_err(map_err)
        })
        .await
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> AdapterResult<Vec<Option<String>>> {
        self.timed("HMGET", async {
            let mut conn = self.conn.lock().await;
            conn.hget(key, fields).await.map_err(map_err)
        })
        .await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> AdapterResult<i64> {
        self.timed("HDEL", async {
            let mut conn = self.conn.lock().await;
            conn.hdel(key, fields).await.map_err(map_err)
        })
        .await
    }

    async fn hexists(&self, key: &str, field: &str) -> AdapterResult<bool> {
        self.timed("HEXISTS", async {
            let mut conn = self.conn.lock().await;
            conn.hexists(key, field).await.map_err(map_err)
        })
        .await
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> AdapterResult<i64> {
        self.timed("HINCRBY", async {
            let mut conn = self.conn.lock().await;
            conn.hincr(key, field, delta).await.map_err(map_err)
        })
        .await
    }

    async fn hlen(&self, key: &str) -> AdapterResult<i64> {
        self.timed("HLEN", async {
            let mut conn = self.conn.lock().await;
            conn.hlen(key).await.map_err(map_err)
        })
        .await
    }

    async fn lpush(&self, key: &str, values: &[String]) -> AdapterResult<i64> {
        self.timed("LPUSH", async {
            let mut conn = self.conn.lock().await;
            conn.lpush(key, values).await.map_err(map_err)
        })
        .await
    }

    async fn rpush(&self, key: &str, values: &[String]) -> AdapterResult<i64> {
        self.timed("RPUSH", async {
            let mut conn = self.conn.lock().await;
            conn.rpush(key, values).await.map_err(map_err)
        })
        .await
    }

    async fn lpop(&self, key: &str) -> AdapterResult<Option<String>> {
        self.timed("LPOP", async {
            let mut conn = self.conn.lock().await;
            conn.lpop(key, None).await.map_err(map_err)
        })
        .await
    }

    async fn rpop(&self, key: &str) -> AdapterResult<Option<String>> {
        self.timed("RPOP", async {
            let mut conn = self.conn.lock().await;
            conn.rpop(key, None).await.map_err(map_err)
        })
        .await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<String>> {
        self.timed("LRANGE", async {
            let mut conn = self.conn.lock().await;
            conn.lrange(key, start as isize, stop as isize).await.map_err(map_err)
        })
        .await
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> AdapterResult<()> {
        self.timed("LTRIM", async {
            let mut conn = self.conn.lock().await;
            conn.ltrim(key, start as isize, stop as isize).await.map_err(map_err)
        })
        .await
    }

    async fn lindex(&self, key: &str, index: i64) -> AdapterResult<Option<String>> {
        self.timed("LINDEX", async {
            let mut conn = self.conn.lock().await;
            conn.lindex(key, index as isize).await.map_err(map_err)
        })
        .await
    }

    async fn lset(&self, key: &str, index: i64, value: &str) -> AdapterResult<()> {
        self.timed("LSET", async {
            let mut conn = self.conn.lock().await;
            conn.lset(key, index as isize, value).await.map_err(map_err)
        })
        .await
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> AdapterResult<i64> {
        self.timed("LREM", async {
            let mut conn = self.conn.lock().await;
            conn.lrem(key, count as isize, value).await.map_err(map_err)
        })
        .await
    }

    async fn lpos(&self, key: &str, value: &str) -> AdapterResult<Option<i64>> {
        self.timed("LPOS", async {
            let mut conn = self.conn.lock().await;
            redis::cmd("LPOS").arg(key).arg(value).query_async(&mut *conn).await.map_err(map_err)
        })
        .await
    }

    async fn linsert(&self, key: &str, before: bool, pivot: &str, value: &str) -> AdapterResult<i64> {
        self.timed("LINSERT", async {
            let mut conn = self.conn.lock().await;
            let position = if before { "BEFORE" } else { "AFTER" };
            redis::cmd("LINSERT")
                .arg(key)
                .arg(position)
                .arg(pivot)
                .arg(value)
                .query_async(&mut *conn)
                .await
                .map_err(map_err)
        })
        .await
    }

    async fn sadd(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("SADD", async {
            let mut conn = self.conn.lock().await;
            conn.sadd(key, members).await.map_err(map_err)
        })
        .await
    }

    async fn srem(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("SREM", async {
            let mut conn = self.conn.lock().await;
            conn.srem(key, members).await.map_err(map_err)
        })
        .await
    }

    async fn smembers(&self, key: &str) -> AdapterResult<Vec<String>> {
        self.timed("SMEMBERS", async {
            let mut conn = self.conn.lock().await;
            conn.smembers(key).await.map_err(map_err)
        })
        .await
    }

    async fn sismember(&self, key: &str, member: &str) -> AdapterResult<bool> {
        self.timed("SISMEMBER", async {
            let mut conn = self.conn.lock().await;
            conn.sismember(key, member).await.map_err(map_err)
        })
        .await
    }

    async fn scard(&self, key: &str) -> AdapterResult<i64> {
        self.timed("SCARD", async {
            let mut conn = self.conn.lock().await;
            conn.scard(key).await.map_err(map_err)
        })
        .await
    }

    async fn sinter(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SINTER", async {
            let mut conn = self.conn.lock().await;
            conn.sinter(keys).await.map_err(map_err)
        })
        .await
    }

    async fn sunion(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SUNION", async {
            let mut conn = self.conn.lock().await;
            conn.sunion(keys).await.map_err(map_err)
        })
        .await
    }

    async fn sdiff(&self, keys: &[String]) -> AdapterResult<Vec<String>> {
        self.timed("SDIFF", async {
            let mut conn = self.conn.lock().await;
            conn.sdiff(keys).await.map_err(map_err)
        })
        .await
    }

    async fn zadd(&self, key: &str, members: &[(f64, String)], opts: ZAddOptions) -> AdapterResult<i64> {
        self.timed("ZADD", async {
            let mut conn = self.conn.lock().await;
            let mut cmd = redis::cmd("ZADD");
            cmd.arg(key);
            if opts.nx {
                cmd.arg("NX");
            }
            if opts.xx {
                cmd.arg("XX");
            }
            if opts.gt {
                cmd.arg("GT");
            }
            if opts.lt {
                cmd.arg("LT");
            }
            for (score, member) in members {
                cmd.arg(score).arg(member);
            }
            cmd.query_async(&mut *conn).await.map_err(map_err)
        })
        .await
    }

    async fn zrem(&self, key: &str, members: &[String]) -> AdapterResult<i64> {
        self.timed("ZREM", async {
            let mut conn = self.conn.lock().await;
            conn.zrem(key, members).await.map_err(map_err)
        })
        .await
    }

    async fn zscore(&self, key: &str, member: &str) -> AdapterResult<Option<f64>> {
        self.timed("ZSCORE", async {
            let mut conn = self.conn.lock().await;
            conn.zscore(key, member).await.map_err(map_err)
        })
        .await
    }

    async fn zrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>> {
        self.timed("ZRANK", async {
            let mut conn = self.conn.lock().await;
            conn.zrank(key, member).await.map_err(map_err)
        })
        .await
    }

    async fn zrevrank(&self, key: &str, member: &str) -> AdapterResult<Option<i64>> {
        self.timed("ZREVRANK", async {
            let mut conn = self.conn.lock().await;
            conn.zrevrank(key, member).await.map_err(map_err)
        })
        .await
    }

    async fn zcard(&self, key: &str) -> AdapterResult<i64> {
        self.timed("ZCARD", async {
            let mut conn = self.conn.lock().await;
            conn.zcard(key).await.map_err(map_err)
        })
        .await
    }

    async fn zcount(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64> {
        self.timed("ZCOUNT", async {
            let mut conn = self.conn.lock().await;
            conn.zcount(key, min, max).await.map_err(map_err)
        })
        .await
    }

    async fn zincrby(&self, key: &str, delta: f64, member: &str) -> AdapterResult<f64> {
        self.timed("ZINCRBY", async {
            let mut conn = self.conn.lock().await;
            conn.zincr(key, member, delta).await.map_err(map_err)
        })
        .await
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZRANGE", async {
            let mut conn = self.conn.lock().await;
            conn.zrange_withscores(key, start as isize, stop as isize).await.map_err(map_err)
        })
        .await
    }

    async fn zrevrange(&self, key: &str, start: i64, stop: i64) -> AdapterResult<Vec<(String, f64)>> {
        self.timed("ZREVRANGE", async {
            let mut conn = self.conn.lock().await;
            conn.zrevrange_withscores(key, start as isize, stop as isize).await.map_err(map_err)
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
            let mut conn = self.conn.lock().await;
            match limit {
                Some((offset, count)) => conn
                    .zrangebyscore_limit_withscores(key, min, max, offset as isize, count as isize)
                    .await
                    .map_err(map_err),
                None => conn.zrangebyscore_withscores(key, min, max).await.map_err(map_err),
            }
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
            let mut conn = self.conn.lock().await;
            match limit {
                Some((offset, count)) => conn
                    .zrevrangebyscore_limit_withscores(key, max, min, offset as isize, count as isize)
                    .await
                    .map_err(map_err),
                None => conn.zrevrangebyscore_withscores(key, max, min).await.map_err(map_err),
            }
        })
        .await
    }

    async fn zremrangebyrank(&self, key: &str, start: i64, stop: i64) -> AdapterResult<i64> {
        self.timed("ZREMRANGEBYRANK", async {
            let mut conn = self.conn.lock().await;
            conn.zremrangebyrank(key, start as isize, stop as isize).await.map_err(map_err)
        })
        .await
    }

    async fn zremrangebyscore(&self, key: &str, min: &str, max: &str) -> AdapterResult<i64> {
        self.timed("ZREMRANGEBYSCORE", async {
            let mut conn = self.conn.lock().await;
            conn.zrembyscore(key, min, max).await.map_err(map_err)
        })
        .await
    }

    async fn del(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("DEL", async {
            let mut conn = self.conn.lock().await;
            conn.del(keys).await.map_err(map_err)
        })
        .await
    }

    async fn exists(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("EXISTS", async {
            let mut conn = self.conn.lock().await;
            conn.exists(keys).await.map_err(map_err)
        })
        .await
    }

    async fn expire(&self, key: &str, seconds: u64) -> AdapterResult<bool> {
        self.timed("EXPIRE", async {
            let mut conn = self.conn.lock().await;
            conn.expire(key, seconds as i64).await.map_err(map_err)
        })
        .await
    }

    async fn expire_at(&self, key: &str, unix_seconds: i64) -> AdapterResult<bool> {
        self.timed("EXPIREAT", async {
            let mut conn = self.conn.lock().await;
            conn.expire_at(key, unix_seconds).await.map_err(map_err)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> AdapterResult<i64> {
        self.timed("TTL", async {
            let mut conn = self.conn.lock().await;
            conn.ttl(key).await.map_err(map_err)
        })
        .await
    }

    async fn pttl(&self, key: &str) -> AdapterResult<i64> {
        self.timed("PTTL", async {
            let mut conn = self.conn.lock().await;
            redis::cmd("PTTL").arg(key).query_async(&mut *conn).await.map_err(map_err)
        })
        .await
    }

    async fn persist(&self, key: &str) -> AdapterResult<bool> {
        self.timed("PERSIST", async {
            let mut conn = self.conn.lock().await;
            conn.persist(key).await.map_err(map_err)
        })
        .await
    }

    async fn rename(&self, src: &str, dst: &str) -> AdapterResult<()> {
        self.timed("RENAME", async {
            let mut conn = self.conn.lock().await;
            conn.rename(src, dst).await.map_err(map_err)
        })
        .await
    }

    async fn key_type(&self, key: &str) -> AdapterResult<DataType> {
        self.timed("TYPE", async {
            let mut conn = self.conn.lock().await;
            let literal: String = conn.key_type(key).await.map_err(map_err)?;
            Ok(match literal.as_str() {
                "string" => DataType::String,
                "list" => DataType::List,
                "set" => DataType::Set,
                "zset" => DataType::SortedSet,
                "hash" => DataType::Hash,
                "stream" => DataType::Stream,
                other => return Err(CommandError::Command(format!("unrecognized TYPE reply: {other}"))),
            })
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> AdapterResult<Vec<String>> {
        self.timed("KEYS", async {
            let mut conn = self.conn.lock().await;
            conn.keys(pattern).await.map_err(map_err)
        })
        .await
    }

    async fn scan(&self, cursor: u64, opts: ScanOptions) -> AdapterResult<ScanPage> {
        self.timed("SCAN", async {
            let mut conn = self.conn.lock().await;
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor);
            if let Some(pattern) = &opts.match_pattern {
                cmd.arg("MATCH").arg(pattern);
            }
            if let Some(count) = opts.count {
                cmd.arg("COUNT").arg(count);
            }
            if let Some(type_filter) = opts.type_filter {
                cmd.arg("TYPE").arg(type_filter.as_type_literal());
            }
            let (next_cursor, keys): (u64, Vec<String>) = cmd.query_async(&mut *conn).await.map_err(map_err)?;
            Ok(ScanPage { next_cursor, keys })
        })
        .await
    }

    async fn pfadd(&self, key: &str, elements: &[String]) -> AdapterResult<bool> {
        self.timed("PFADD", async {
            let mut conn = self.conn.lock().await;
            conn.pfadd(key, elements).await.map_err(map_err)
        })
        .await
    }

    async fn pfcount(&self, keys: &[String]) -> AdapterResult<i64> {
        self.timed("PFCOUNT", async {
            let mut conn = self.conn.lock().await;
            conn.pfcount(keys).await.map_err(map_err)
        })
        .await
    }

    async fn pfmerge(&self, dest: &str, sources: &[String]) -> AdapterResult<()> {
        self.timed("PFMERGE", async {
            let mut conn = self.conn.lock().await;
            conn.pfmerge(dest, sources).await.map_err(map_err)
        })
        .await
    }

    // Bloom filter commands require the RedisBloom module; see
    // `supports_bloom` — left at the trait's `NotSupported` default.

    async fn xadd(&self, key: &str, id: &str, fields: &[(String, String)]) -> AdapterResult<String> {
        self.timed("XADD", async {
            let mut conn = self.conn.lock().await;
            conn.xadd(key, id, fields).await.map_err(map_err)
        })
        .await
    }

    async fn xrange(&self, key: &str, start: &str, end: &str, count: Option<u64>) -> AdapterResult<Vec<StreamRecord>> {
        self.timed("XRANGE", async {
            let mut conn = self.conn.lock().await;
            let reply: redis::streams::StreamRangeReply = match count {
                Some(c) => conn.xrange_count(key, start, end, c).await.map_err(map_err)?,
                None => conn.xrange(key, start, end).await.map_err(map_err)?,
            };
            Ok(stream_reply_to_records(reply))
        })
        .await
    }

    async fn xrevrange(&self, key: &str, end: &str, start: &str, count: Option<u64>) -> AdapterResult<Vec<StreamRecord>> {
        self.timed("XREVRANGE", async {
            let mut conn = self.conn.lock().await;
            let reply: redis::streams::StreamRangeReply = match count {
                Some(c) => conn.xrevrange_count(key, end, start, c).await.map_err(map_err)?,
                None => conn.xrevrange(key, end, start).await.map_err(map_err)?,
            };
            Ok(stream_reply_to_records(reply))
        })
        .await
    }

    async fn xlen(&self, key: &str) -> AdapterResult<i64> {
        self.timed("XLEN", async {
            let mut conn = self.conn.lock().await;
            conn.xlen(key).await.map_err(map_err)
        })
        .await
    }

    async fn xtrim(&self, key: &str, strategy: TrimStrategy, threshold: &str, approximate: bool) -> AdapterResult<i64> {
        self.timed("XTRIM", async {
            let mut conn = self.conn.lock().await;
            let mut cmd = redis::cmd("XTRIM");
            cmd.arg(key);
            match strategy {
                TrimStrategy::MaxLen => cmd.arg("MAXLEN"),
                TrimStrategy::MinId => cmd.arg("MINID"),
            };
            if approximate {
                cmd.arg("~");
            }
            cmd.arg(threshold);
            cmd.query_async(&mut *conn).await.map_err(map_err)
        })
        .await
    }

    async fn xdel(&self, key: &str, ids: &[String]) -> AdapterResult<i64> {
        self.timed("XDEL", async {
            let mut conn = self.conn.lock().await;
            conn.xdel(key, ids).await.map_err(map_err)
        })
        .await
    }

    async fn dispatch(&self, command: Command, args: &[CommandArg]) -> AdapterResult<RawValue> {
        self.timed(command.name(), async {
            let mut conn = self.conn.lock().await;
            let mut cmd = redis::cmd(command.name());
            for arg in args {
                match arg {
                    CommandArg::Key(s) | CommandArg::Str(s) => {
                        cmd.arg(s);
                    }
                    CommandArg::Int(n) => {
                        cmd.arg(n);
                    }
                    CommandArg::Float(f) => {
                        cmd.arg(f);
                    }
                    CommandArg::Bool(b) => {
                        cmd.arg(if *b { 1 } else { 0 });
                    }
                }
            }
            let reply: redis::Value = cmd.query_async(&mut *conn).await.map_err(map_err)?;
            redis_value_to_raw(reply)
        })
        .await
    }

    async fn execute_transaction(&self, entries: &[PipelineEntry]) -> TransactionOutcome {
        let mut conn = self.conn.lock().await;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries {
            let mut cmd = redis::cmd(entry.command.name());
            for arg in &entry.args {
                match arg {
                    CommandArg::Key(s) | CommandArg::Str(s) => {
                        cmd.arg(s);
                    }
                    CommandArg::Int(n) => {
                        cmd.arg(n);
                    }
                    CommandArg::Float(f) => {
                        cmd.arg(f);
                    }
                    CommandArg::Bool(b) => {
                        cmd.arg(if *b { 1 } else { 0 });
                    }
                }
            }
            pipe.add_command(cmd);
        }
        match pipe.query_async::<Vec<redis::Value>>(&mut *conn).await {
            Ok(values) => {
                let mut results = Vec::with_capacity(values.len());
                for v in values {
                    match redis_value_to_raw(v) {
                        Ok(raw) => results.push(raw),
                        Err(e) => return TransactionOutcome::aborted(e.to_string()),
                    }
                }
                TransactionOutcome::committed(results)
            }
            Err(e) => TransactionOutcome::aborted(map_err(e).to_string()),
        }
    }

    /// Execute via `EVALSHA`, falling back to `EVAL` and caching the script
    /// on a `NOSCRIPT` reply.
    async fn execute_script(&self, script: &str, keys: &[String], args: &[CommandArg]) -> AdapterResult<RawValue> {
        self.timed("EVALSHA", async {
            let mut conn = self.conn.lock().await;
            let redis_script = redis::Script::new(script);
            let mut invocation = redis_script.key(keys);
            for arg in args {
                invocation = match arg {
                    CommandArg::Key(s) | CommandArg::Str(s) => invocation.arg(s),
                    CommandArg::Int(n) => invocation.arg(n),
                    CommandArg::Float(f) => invocation.arg(f),
                    CommandArg::Bool(b) => invocation.arg(if *b { 1 } else { 0 }),
                };
            }
            let reply: redis::Value = invocation.invoke_async(&mut *conn).await.map_err(map_err)?;
            redis_value_to_raw(reply)
        })
        .await
    }

    async fn publish(&self, channel: &str, message: &str) -> AdapterResult<i64> {
        self.timed("PUBLISH", async {
            let mut conn = self.conn.lock().await;
            conn.publish(channel, message).await.map_err(map_err)
        })
        .await
    }

    async fn stats(&self) -> AdapterResult<CacheStats> {
        Ok(self.metrics.stats())
    }

    async fn reset_stats(&self) {
        self.metrics.reset();
    }
}

fn stream_reply_to_records(reply: redis::streams::StreamRangeReply) -> Vec<StreamRecord> {
    reply
        .ids
        .into_iter()
        .map(|id| StreamRecord {
            id: id.id,
            fields: id
                .map
                .into_iter()
                .filter_map(|(k, v)| redis::FromRedisValue::from_redis_value(&v).ok().map(|s: String| (k, s)))
                .collect(),
        })
        .collect()
}

fn redis_value_to_raw(value: redis::Value) -> Result<RawValue, CommandError> {
    Ok(match value {
        redis::Value::Nil => RawValue::Nil,
        redis::Value::Okay => RawValue::Ok,
        redis::Value::Int(i) => RawValue::Integer(i),
        redis::Value::Double(d) => RawValue::Double(d),
        redis::Value::Boolean(b) => RawValue::Boolean(b),
        redis::Value::BulkString(bytes) => {
            RawValue::Bulk(String::from_utf8_lossy(&bytes).into_owned())
        }
        redis::Value::SimpleString(s) => RawValue::Bulk(s),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            RawValue::Array(items.into_iter().map(redis_value_to_raw).collect::<Result<_, _>>()?)
        }
        redis::Value::Map(pairs) => RawValue::Array(
            pairs
                .into_iter()
                .map(|(k, v)| Ok::<_, CommandError>(vec![redis_value_to_raw(k)?, redis_value_to_raw(v)?]))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect(),
        ),
        other => return Err(CommandError::Command(format!("unhandled reply shape: {other:?}"))),
    })
}
