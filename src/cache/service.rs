//! Cache service: TTL cache, sync queue, and connectivity handling.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::{Backend, Row};
use crate::notify::{LogNotifier, Notifier};

use super::entry::CacheStats;
use super::queue::{DrainReport, Operation, QueueItem, RetryPolicy};
use super::queue_store::QueueStore;
use super::store::CacheStore;

/// Owned cache and sync-queue state for one application session.
///
/// The service is constructor-injected: callers receive an `Arc` and go
/// through its public operations only. All cache mutations are short
/// synchronous critical sections; backend calls are awaited outside of them.
pub struct CacheService<B: Backend, Q: QueueStore> {
  store: Mutex<CacheStore>,
  queue: Q,
  backend: Arc<B>,
  online: AtomicBool,
  /// Timestamp of the last completed drain pass, ms since the epoch.
  /// Zero means no pass has completed yet.
  last_sync: AtomicI64,
  max_retries: u32,
  retry_policy: RetryPolicy,
  notifier: Arc<dyn Notifier>,
  /// Serializes drain passes; a reconnect during a running drain waits
  /// instead of interleaving.
  drain_lock: tokio::sync::Mutex<()>,
}

impl<B: Backend, Q: QueueStore> CacheService<B, Q> {
  pub fn new(backend: Arc<B>, queue: Q) -> Self {
    Self {
      store: Mutex::new(CacheStore::new(300_000)),
      queue,
      backend,
      online: AtomicBool::new(true),
      last_sync: AtomicI64::new(0),
      max_retries: 3,
      retry_policy: RetryPolicy::Backoff {
        base_ms: 1_000,
        cap_ms: 60_000,
      },
      notifier: Arc::new(LogNotifier),
      drain_lock: tokio::sync::Mutex::new(()),
    }
  }

  /// Set the default TTL applied by `set`.
  pub fn with_default_ttl(self, ttl_ms: i64) -> Self {
    Self {
      store: Mutex::new(CacheStore::new(ttl_ms)),
      ..self
    }
  }

  /// Set the retry budget assigned to newly queued operations.
  pub fn with_max_retries(mut self, max_retries: u32) -> Self {
    self.max_retries = max_retries;
    self
  }

  pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
    self.retry_policy = policy;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  fn store(&self) -> std::sync::MutexGuard<'_, CacheStore> {
    self.store.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Return a cached value if present and unexpired. No network fallback;
  /// the caller re-fetches on a miss.
  pub fn get(&self, key: &str) -> Option<Value> {
    self.store().get(key)
  }

  /// Cache a value under `key` with the default TTL, overwriting any
  /// existing entry.
  pub fn set(&self, key: &str, data: Value) {
    self.store().set(key, data);
  }

  pub fn set_with_ttl(&self, key: &str, data: Value, ttl_ms: i64) {
    self.store().set_with_ttl(key, data, ttl_ms);
  }

  pub fn remove(&self, key: &str) {
    self.store().remove(key);
  }

  /// Empty both the cache map and the sync queue. Irreversible.
  pub fn clear(&self) -> Result<()> {
    self.store().clear();
    self.queue.clear()
  }

  /// Remove every cached entry whose key matches the regular expression.
  pub fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
    self.store().invalidate_pattern(pattern)
  }

  /// Evict all expired entries. Returns the number evicted.
  pub fn sweep_expired(&self) -> usize {
    self.store().sweep_expired()
  }

  /// Append a write operation to the tail of the sync queue. Does not
  /// attempt immediate execution: the item is picked up by the next drain,
  /// which runs on the offline-to-online transition and on the periodic
  /// sweep (see `spawn_sweeper`).
  pub fn queue_offline_operation(
    &self,
    operation: Operation,
    table: &str,
    data: Value,
  ) -> Result<QueueItem> {
    let item = QueueItem::new(operation, table, data, self.max_retries);
    self.queue.push(&item)?;
    tracing::debug!(id = %item.id, table, op = operation.as_str(), "queued offline operation");
    Ok(item)
  }

  pub fn stats(&self) -> Result<CacheStats> {
    let last_sync = self.last_sync.load(Ordering::SeqCst);
    Ok(CacheStats {
      size: self.store().len(),
      queue_size: self.queue.len()?,
      last_sync: (last_sync != 0).then_some(last_sync),
    })
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Mark the backend unreachable. Suppresses drains until the next
  /// online transition.
  pub fn set_offline(&self) {
    self.online.store(false, Ordering::SeqCst);
    tracing::debug!("connectivity lost, buffering writes");
  }

  /// Mark the backend reachable and attempt a queue drain.
  pub async fn set_online(&self) -> Result<DrainReport> {
    self.online.store(true, Ordering::SeqCst);
    self.drain_queue().await
  }

  /// Replay queued operations against the backend, in FIFO order, one at a
  /// time.
  ///
  /// A successful item is removed; a failed item stays for a later pass
  /// until its retry budget is spent, then it is dropped and reported.
  /// `last_sync` advances after every completed pass regardless of
  /// individual outcomes.
  pub async fn drain_queue(&self) -> Result<DrainReport> {
    let _guard = self.drain_lock.lock().await;

    if !self.is_online() {
      return Ok(DrainReport::default());
    }
    let items = self.queue.items()?;
    if items.is_empty() {
      return Ok(DrainReport::default());
    }

    let pass_started_at = Utc::now().timestamp_millis();
    let mut report = DrainReport::default();

    for mut item in items {
      if !item.is_due(pass_started_at) {
        report.deferred += 1;
        continue;
      }

      match self.execute(&item).await {
        Ok(()) => {
          self.queue.remove(&item.id)?;
          report.synced += 1;
        }
        Err(e) if item.retries_exhausted() => {
          self.queue.remove(&item.id)?;
          report.dropped += 1;
          tracing::warn!(
            id = %item.id,
            table = %item.table,
            error = %e,
            "dropping queued {} after {} retries",
            item.operation.as_str(),
            item.max_retries
          );
          self.notifier.error(&format!(
            "Discarded pending {} on {} after {} retries",
            item.operation.as_str(),
            item.table,
            item.max_retries
          ));
        }
        Err(e) => {
          item.retry_count += 1;
          item.next_attempt_at = self
            .retry_policy
            .next_attempt(item.retry_count, Utc::now().timestamp_millis());
          self.queue.update(&item)?;
          report.failed += 1;
          tracing::debug!(
            id = %item.id,
            table = %item.table,
            retry_count = item.retry_count,
            error = %e,
            "queued operation failed, will retry"
          );
        }
      }
    }

    self
      .last_sync
      .store(Utc::now().timestamp_millis(), Ordering::SeqCst);

    if report.synced > 0 {
      self
        .notifier
        .success(&format!("Synced {} offline operation(s)", report.synced));
    }

    Ok(report)
  }

  async fn execute(&self, item: &QueueItem) -> Result<()> {
    match item.operation {
      Operation::Create => {
        let row = object_payload(&item.data)?;
        self.backend.insert(&item.table, row).await?;
      }
      Operation::Update => {
        let mut patch = object_payload(&item.data)?;
        let id = take_id(&mut patch, item)?;
        self.backend.update(&item.table, &id, patch).await?;
      }
      Operation::Delete => {
        let id = item
          .data
          .get("id")
          .and_then(Value::as_str)
          .ok_or_else(|| eyre!("Queued delete on {} has no id", item.table))?;
        self.backend.delete(&item.table, id).await?;
      }
    }
    Ok(())
  }
}

impl<B: Backend + 'static, Q: QueueStore + 'static> CacheService<B, Q> {
  /// Spawn the periodic eviction sweep. This is the only automatic eviction
  /// path besides the lazy eviction in `get`.
  ///
  /// The sweep also drains the queue opportunistically, so operations
  /// queued while already online do not wait for a connectivity edge.
  pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
    let service = Arc::clone(self);
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      // The first tick fires immediately; skip it so a fresh cache is
      // not swept at startup.
      interval.tick().await;
      loop {
        interval.tick().await;
        let evicted = service.sweep_expired();
        if evicted > 0 {
          tracing::debug!(evicted, "swept expired cache entries");
        }

        let pending = service.queue.len().unwrap_or(0);
        if pending > 0 && service.is_online() {
          if let Err(e) = service.drain_queue().await {
            tracing::warn!(error = %e, "periodic drain failed");
          }
        }
      }
    })
  }

  /// Follow a connectivity signal: drain on the offline-to-online edge,
  /// flip the flag on the way down.
  pub fn spawn_connectivity_listener(
    self: &Arc<Self>,
    mut rx: watch::Receiver<bool>,
  ) -> JoinHandle<()> {
    let service = Arc::clone(self);
    tokio::spawn(async move {
      while rx.changed().await.is_ok() {
        let online = *rx.borrow_and_update();
        if online {
          if let Err(e) = service.set_online().await {
            tracing::warn!(error = %e, "reconnect drain failed");
          }
        } else {
          service.set_offline();
        }
      }
    })
  }
}

fn object_payload(data: &Value) -> Result<Row> {
  data
    .as_object()
    .cloned()
    .ok_or_else(|| eyre!("Queued payload is not an object"))
}

fn take_id(patch: &mut Row, item: &QueueItem) -> Result<String> {
  let id = patch
    .remove("id")
    .and_then(|v| v.as_str().map(String::from))
    .ok_or_else(|| eyre!("Queued update on {} has no id", item.table))?;
  Ok(id)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{Filter, MemoryBackend};
  use crate::cache::queue_store::MemoryQueueStore;
  use crate::connectivity::ConnectivityWatcher;
  use crate::notify::{ChannelNotifier, ToastKind};
  use serde_json::json;

  /// Route log output through the test harness. Set RUST_LOG to see
  /// cache/queue decision points while debugging a test.
  fn trace_init() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  }

  fn service(backend: Arc<MemoryBackend>) -> CacheService<MemoryBackend, MemoryQueueStore> {
    trace_init();
    CacheService::new(backend, MemoryQueueStore::new())
      .with_retry_policy(RetryPolicy::Legacy)
      .with_max_retries(2)
  }

  #[tokio::test]
  async fn test_drain_executes_in_fifo_order() {
    let backend = Arc::new(MemoryBackend::new());
    let service = service(Arc::clone(&backend));

    for n in 1..=3 {
      service
        .queue_offline_operation(Operation::Create, "bookings", json!({"seq": n}))
        .unwrap();
    }

    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.synced, 3);
    assert_eq!(service.stats().unwrap().queue_size, 0);

    let rows = backend.select("bookings", &Filter::new()).await.unwrap();
    let order: Vec<_> = rows.iter().map(|r| r.get("seq").cloned().unwrap()).collect();
    assert_eq!(order, vec![json!(1), json!(2), json!(3)]);
  }

  #[tokio::test]
  async fn test_retry_exhaustion_drops_failing_items() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_failing("fail_a", true);
    backend.set_failing("fail_b", true);
    let (notifier, mut toasts) = ChannelNotifier::channel();
    let service = service(Arc::clone(&backend)).with_notifier(Arc::new(notifier));

    service
      .queue_offline_operation(Operation::Create, "fail_a", json!({"n": 1}))
      .unwrap();
    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 2}))
      .unwrap();
    service
      .queue_offline_operation(Operation::Create, "fail_b", json!({"n": 3}))
      .unwrap();

    // Pass 1: the good item syncs, the failing two stay
    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 2);
    let first_sync = service.stats().unwrap().last_sync.unwrap();

    // Pass 2: both fail again, still within budget
    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(service.stats().unwrap().queue_size, 2);

    // Pass 3: retry budget spent, both dropped
    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.dropped, 2);
    assert_eq!(service.stats().unwrap().queue_size, 0);

    let last_sync = service.stats().unwrap().last_sync.unwrap();
    assert!(last_sync >= first_sync);

    // The success toast from pass 1 comes first, then the drop reports
    assert_eq!(toasts.recv().await.unwrap().kind, ToastKind::Success);
    assert_eq!(toasts.recv().await.unwrap().kind, ToastKind::Error);
    assert_eq!(toasts.recv().await.unwrap().kind, ToastKind::Error);
  }

  #[tokio::test]
  async fn test_drain_is_noop_while_offline() {
    let backend = Arc::new(MemoryBackend::new());
    let service = service(Arc::clone(&backend));
    service.set_offline();

    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 1}))
      .unwrap();

    let report = service.drain_queue().await.unwrap();
    assert_eq!(report, DrainReport::default());
    assert_eq!(service.stats().unwrap().queue_size, 1);
    // No pass ran, so last_sync is untouched
    assert_eq!(service.stats().unwrap().last_sync, None);
  }

  #[tokio::test]
  async fn test_reconnect_triggers_drain() {
    let backend = Arc::new(MemoryBackend::new());
    let service = service(Arc::clone(&backend));
    service.set_offline();

    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 1}))
      .unwrap();

    let report = service.set_online().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(backend.row_count("bookings"), 1);
  }

  #[tokio::test]
  async fn test_connectivity_listener_drains_on_online_edge() {
    let backend = Arc::new(MemoryBackend::new());
    let service = Arc::new(service(Arc::clone(&backend)));
    let watcher = ConnectivityWatcher::new(true);
    let handle = service.spawn_connectivity_listener(watcher.subscribe());

    watcher.set_offline();
    // Give the listener a chance to observe the transition
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!service.is_online());

    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 1}))
      .unwrap();

    watcher.set_online();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(service.is_online());
    assert_eq!(backend.row_count("bookings"), 1);
    assert_eq!(service.stats().unwrap().queue_size, 0);

    handle.abort();
  }

  #[tokio::test]
  async fn test_sweeper_drains_items_queued_while_online() {
    let backend = Arc::new(MemoryBackend::new());
    let service = Arc::new(service(Arc::clone(&backend)));
    let handle = service.spawn_sweeper(Duration::from_millis(20));

    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 1}))
      .unwrap();

    // No connectivity edge happens; the periodic sweep picks the item up
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.row_count("bookings"), 1);
    assert_eq!(service.stats().unwrap().queue_size, 0);

    handle.abort();
  }

  #[tokio::test]
  async fn test_update_and_delete_replay() {
    let backend = Arc::new(MemoryBackend::new());
    backend
      .insert("bookings", object_payload(&json!({"id": "b1", "guest_name": "Ana"})).unwrap())
      .await
      .unwrap();
    backend
      .insert("bookings", object_payload(&json!({"id": "b2", "guest_name": "Rui"})).unwrap())
      .await
      .unwrap();
    let service = service(Arc::clone(&backend));

    service
      .queue_offline_operation(Operation::Update, "bookings", json!({"id": "b1", "guest_name": "Maria"}))
      .unwrap();
    service
      .queue_offline_operation(Operation::Delete, "bookings", json!({"id": "b2"}))
      .unwrap();

    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.synced, 2);

    let rows = backend.select("bookings", &Filter::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("guest_name"), Some(&json!("Maria")));
  }

  #[tokio::test]
  async fn test_backoff_defers_failed_items() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_failing("fail", true);
    let service = CacheService::new(Arc::clone(&backend), MemoryQueueStore::new())
      .with_max_retries(5)
      .with_retry_policy(RetryPolicy::Backoff {
        base_ms: 3_600_000,
        cap_ms: 3_600_000,
      });

    service
      .queue_offline_operation(Operation::Create, "fail", json!({"n": 1}))
      .unwrap();

    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.failed, 1);

    // Not due for another hour: the next pass defers it instead of retrying
    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(service.stats().unwrap().queue_size, 1);
  }

  #[tokio::test]
  async fn test_clear_empties_cache_and_queue() {
    let backend = Arc::new(MemoryBackend::new());
    let service = service(Arc::clone(&backend));

    service.set("properties:1", json!({"id": "p1"}));
    service
      .queue_offline_operation(Operation::Create, "bookings", json!({"n": 1}))
      .unwrap();

    service.clear().unwrap();
    let stats = service.stats().unwrap();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.queue_size, 0);
    assert_eq!(service.get("properties:1"), None);
  }

  #[tokio::test]
  async fn test_malformed_update_payload_is_eventually_dropped() {
    let backend = Arc::new(MemoryBackend::new());
    let service = service(Arc::clone(&backend)).with_max_retries(0);

    // No id in the payload: the update can never execute
    service
      .queue_offline_operation(Operation::Update, "bookings", json!({"guest_name": "Ana"}))
      .unwrap();

    let report = service.drain_queue().await.unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(service.stats().unwrap().queue_size, 0);
  }
}
