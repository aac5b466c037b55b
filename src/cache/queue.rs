//! Pending offline operations and retry scheduling.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Write operation kind for a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Create,
  Update,
  Delete,
}

impl Operation {
  pub fn as_str(&self) -> &'static str {
    match self {
      Operation::Create => "create",
      Operation::Update => "update",
      Operation::Delete => "delete",
    }
  }
}

impl std::str::FromStr for Operation {
  type Err = color_eyre::eyre::Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "create" => Ok(Operation::Create),
      "update" => Ok(Operation::Update),
      "delete" => Ok(Operation::Delete),
      other => Err(color_eyre::eyre::eyre!("Unknown operation: {}", other)),
    }
  }
}

/// A buffered write waiting for connectivity.
///
/// For `Update` and `Delete` the payload must carry an `id` field identifying
/// the target row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
  pub id: String,
  pub operation: Operation,
  pub table: String,
  pub data: Value,
  /// Enqueue time, ms since the epoch.
  pub timestamp: i64,
  pub retry_count: u32,
  pub max_retries: u32,
  /// Earliest time the next attempt may run, ms since the epoch.
  /// Always the enqueue time under the legacy policy.
  pub next_attempt_at: i64,
}

impl QueueItem {
  pub fn new(operation: Operation, table: &str, data: Value, max_retries: u32) -> Self {
    let now = Utc::now().timestamp_millis();
    Self {
      id: Uuid::new_v4().to_string(),
      operation,
      table: table.to_string(),
      data,
      timestamp: now,
      retry_count: 0,
      max_retries,
      next_attempt_at: now,
    }
  }

  /// Whether the retry budget is spent.
  pub fn retries_exhausted(&self) -> bool {
    self.retry_count >= self.max_retries
  }

  pub fn is_due(&self, now_ms: i64) -> bool {
    self.next_attempt_at <= now_ms
  }
}

/// Scheduling of retries between drain passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
  /// Retry on every pass with no delay. Preserves the original client
  /// behavior for migration validation.
  Legacy,
  /// Exponential backoff with jitter, capped at `cap_ms`.
  Backoff { base_ms: i64, cap_ms: i64 },
}

impl RetryPolicy {
  /// Compute when a failed item may be attempted again.
  pub fn next_attempt(&self, retry_count: u32, now_ms: i64) -> i64 {
    match self {
      RetryPolicy::Legacy => now_ms,
      RetryPolicy::Backoff { base_ms, cap_ms } => {
        let exp = retry_count.min(30);
        // Clamp to non-negative so misconfigured delays degrade to
        // immediate retry instead of panicking on an empty jitter range
        let delay = base_ms.saturating_mul(1_i64 << exp).min(*cap_ms).max(0);
        let jitter = rand::thread_rng().gen_range(0..=delay / 4 + 1);
        now_ms + delay + jitter
      }
    }
  }
}

/// Outcome of one drain pass over the sync queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  /// Items executed successfully and removed.
  pub synced: usize,
  /// Items that failed and remain queued for a later pass.
  pub failed: usize,
  /// Items dropped after exhausting their retry budget.
  pub dropped: usize,
  /// Items skipped because their next attempt is not due yet.
  pub deferred: usize,
}
