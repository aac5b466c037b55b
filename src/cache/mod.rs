//! Offline-aware caching layer for backend query results.
//!
//! This module provides:
//! - A TTL-based in-memory cache of query results, with lazy eviction on read
//!   and a periodic background sweep
//! - A FIFO queue of pending write operations, buffered while offline and
//!   replayed against the backend when connectivity returns
//! - A `CacheService` that owns both and reacts to connectivity transitions

mod entry;
mod queue;
mod queue_store;
mod service;
mod store;

pub use entry::{CacheEntry, CacheStats, CACHE_SCHEMA_VERSION};
pub use queue::{DrainReport, Operation, QueueItem, RetryPolicy};
pub use queue_store::{MemoryQueueStore, QueueStore, SqliteQueueStore};
pub use service::CacheService;
pub use store::CacheStore;
