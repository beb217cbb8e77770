//! corecache-adapter — the uniform [`Adapter`] contract plus two
//! implementations: an in-process backend with no external dependency, and
//! an external adapter speaking to a Redis-compatible server.

pub mod adapter;
pub mod in_process;
pub mod options;
pub mod pipeline;

#[cfg(feature = "redis-backend")]
pub mod redis_adapter;

pub use adapter::{Adapter, AdapterResult, ScanPage};
pub use in_process::InProcessAdapter;
pub use options::{RangeLimit, ScanOptions, SetOptions, SetOutcome, TrimStrategy, ZAddOptions};
pub use pipeline::{PipelineEntry, PipelineOutcome, StreamRecord, TransactionOutcome};

#[cfg(feature = "redis-backend")]
pub use redis_adapter::RedisAdapter;
