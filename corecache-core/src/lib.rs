//! corecache-core — Key Builder, Operation Descriptor/Schema, error
//! taxonomy, configuration, and metrics types shared by every corecache
//! crate. Pure data and parsing: no I/O, no adapter, no async.

mod command;
mod config;
mod descriptor;
mod error;
mod key;
mod metrics;
mod raw;
mod value;

pub use command::Command;
pub use config::{
    ActionExecuteConfig, DefaultOptions, ErrorStrategy, FacadeConfig, LockConfig, RateLimitConfig,
    WindowLimit,
};
pub use descriptor::{OperationDescriptor, Schema};
pub use error::{CommandError, ConfigError, CoreCacheError, CoreCacheResult};
pub use key::{build_glob, parse_pattern, KeyBuilder, KeyPattern};
pub use metrics::{CacheStats, CommandStats, Metrics};
pub use raw::{CommandArg, RawValue};
pub use value::{DataType, JsonSerializer, ScoreBound, Serializer};
