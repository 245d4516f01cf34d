//! Report cache.
//!
//! Memoizes derived financial reports per organization:
//! - Canonical request signatures and parameter equality
//! - Append-only store with TTL expiry and a background sweeper
//! - Persistence seam with an in-memory implementation
//! - Per-scope statistics

pub mod backend;
pub mod cache;
pub mod clock;
pub mod error;
pub mod memory;
pub mod signature;
pub mod types;

#[cfg(test)]
mod tests;

pub use backend::ReportCacheBackend;
pub use cache::{CachedReport, ReportCacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use memory::InMemoryReportCache;
pub use signature::{params_equal, signature_of};
pub use types::*;
