//! In-memory gateway state
//!
//! Information Hiding:
//! - Shard layout and lock granularity hidden behind `ShardedMap`
//! - Turn truncation, caps and idle expiry hidden behind `HistoryStore`
//! - Key derivation and insertion-order eviction hidden behind `ResponseCache`
//!
//! Nothing here survives a restart; every map is rebuilt from traffic.

pub mod cache;
pub mod history;
pub mod shard;

pub use cache::{CacheKey, ResponseCache};
pub use history::{HistoryLimits, HistoryStore};
pub use shard::ShardedMap;
