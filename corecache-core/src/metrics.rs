//! Metrics Record: per-command counters and aggregate hit/miss stats.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Atomic per-command counters. Cloning a `CommandStats` shares the same
/// underlying atomics (it's a handle, not a snapshot) so concurrent callers
/// observe and update the same counters without additional locking.
#[derive(Debug, Default)]
struct CommandCounters {
    calls: AtomicU64,
    errors: AtomicU64,
    latency_micros_total: AtomicU64,
}

/// A point-in-time snapshot of one command's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandStats {
    pub calls: u64,
    pub errors: u64,
    pub latency_micros_total: u64,
}

/// A snapshot of the full Metrics Record.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: u64,
    pub evictions: u64,
    pub per_command: HashMap<&'static str, CommandStats>,
}

impl CacheStats {
    /// `hits / (hits + misses)`, `0.0` when no reads have occurred yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Monotonic counters per command plus aggregate hit/miss/size, reset to
/// zero atomically with respect to individual readers.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    size: AtomicU64,
    evictions: AtomicU64,
    per_command: DashMap<&'static str, CommandCounters>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_size(&self, size: u64) {
        self.inner.size.store(size, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.inner.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one command invocation: its latency and whether it errored.
    pub fn record_command(&self, command: &'static str, latency_micros: u64, is_error: bool) {
        let entry = self
            .inner
            .per_command
            .entry(command)
            .or_insert_with(CommandCounters::default);
        entry.calls.fetch_add(1, Ordering::Relaxed);
        entry
            .latency_micros_total
            .fetch_add(latency_micros, Ordering::Relaxed);
        if is_error {
            entry.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let per_command = self
            .inner
            .per_command
            .iter()
            .map(|entry| {
                (
                    *entry.key(),
                    CommandStats {
                        calls: entry.calls.load(Ordering::Relaxed),
                        errors: entry.errors.load(Ordering::Relaxed),
                        latency_micros_total: entry.latency_micros_total.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            size: self.inner.size.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            per_command,
        }
    }

    /// Reset every counter to zero. A concurrent reader observes either the
    /// pre-reset or post-reset value for any individual counter, never a
    /// torn mix of both, because each counter resets with its own atomic
    /// store.
    pub fn reset(&self) {
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        self.inner.evictions.store(0, Ordering::Relaxed);
        self.inner.per_command.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_tracks_hits_and_misses() {
        let metrics = Metrics::new();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        let stats = metrics.stats();
        assert!((stats.hit_rate() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn reset_zeroes_everything() {
        let metrics = Metrics::new();
        metrics.record_hit();
        metrics.record_command("GET", 100, false);
        metrics.reset();
        let stats = metrics.stats();
        assert_eq!(stats.hits, 0);
        assert!(stats.per_command.is_empty());
    }

    #[test]
    fn zero_reads_has_zero_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
