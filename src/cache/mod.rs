//! Local response cache
//!
//! This module provides a best-effort cache used to avoid redundant network
//! fetches. Entries live in an injectable key-value store under a namespace
//! prefix, expire after a fixed TTL, and are evicted oldest-write-first once
//! the namespace grows past its bound. The cache never fails its caller.

mod clock;
mod manager;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheConfig, ResponseCache, CACHE_PREFIX, CACHE_TTL_MINUTES, MAX_CACHE_ENTRIES};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
