//! Offline-aware data core for vacation-rental property management.
//!
//! Three pieces, consumed by UI layers that are out of scope here:
//! - [`cache`]: TTL cache of backend query results plus a FIFO queue of
//!   pending writes, replayed when connectivity returns
//! - [`housekeeping`]: deterministic task generation from booking stay
//!   duration, persisted idempotently
//! - [`backend`]: the minimal table-level contract both sit on, with REST
//!   and in-memory implementations
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let backend = Arc::new(RestBackend::new(&config)?);
//! let queue = MemoryQueueStore::new();
//! let cache = Arc::new(
//!   CacheService::new(Arc::clone(&backend), queue)
//!     .with_default_ttl(config.cache.default_ttl_ms)
//!     .with_max_retries(config.queue.max_retries)
//!     .with_retry_policy(config.queue.retry_policy()),
//! );
//!
//! let connectivity = ConnectivityWatcher::new(true);
//! cache.spawn_connectivity_listener(connectivity.subscribe());
//! cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs));
//!
//! let generator = TaskGenerator::new(backend);
//! let report = generator.generate(&booking).await;
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod housekeeping;
pub mod notify;

pub use backend::{Backend, Filter, InsertOutcome, MemoryBackend, RestBackend, Row};
pub use cache::{
  CacheEntry, CacheService, CacheStats, CacheStore, DrainReport, MemoryQueueStore, Operation,
  QueueItem, QueueStore, RetryPolicy, SqliteQueueStore,
};
pub use config::Config;
pub use connectivity::ConnectivityWatcher;
pub use housekeeping::{
  compute_schedule, Booking, GenerationReport, HousekeepingTask, SkippedTask, TaskGenerator,
  TaskType,
};
pub use notify::{ChannelNotifier, LogNotifier, Notifier, Toast, ToastKind};
