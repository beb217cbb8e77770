//! corecache-limits — the Rate-Limit Service and Lock Service
//!, both built on a single [`corecache_facade::CacheFacade`].

mod lock;
mod rate_limit;

pub use lock::{LockError, LockHandle, LockService};
pub use rate_limit::{RateLimitResult, RateLimitService};
