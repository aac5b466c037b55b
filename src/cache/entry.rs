//! Cache entry and introspection types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema tag stamped on every entry. Fixed for now; reserved for future
/// invalidation when the cached payload shape changes.
pub const CACHE_SCHEMA_VERSION: &str = "1.0";

/// A single cached payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
  pub data: Value,
  /// Creation time, milliseconds since the epoch.
  pub timestamp: i64,
  /// Milliseconds until the entry is considered stale.
  pub ttl: i64,
  pub version: String,
}

impl CacheEntry {
  pub fn new(data: Value, ttl_ms: i64) -> Self {
    Self {
      data,
      timestamp: Utc::now().timestamp_millis(),
      ttl: ttl_ms,
      version: CACHE_SCHEMA_VERSION.to_string(),
    }
  }

  /// An entry is valid iff `now - timestamp < ttl`.
  pub fn is_valid_at(&self, now_ms: i64) -> bool {
    now_ms - self.timestamp < self.ttl
  }

  pub fn is_valid(&self) -> bool {
    self.is_valid_at(Utc::now().timestamp_millis())
  }
}

/// Read-only snapshot of cache and queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  /// Number of entries currently cached (including not-yet-swept stale ones).
  pub size: usize,
  /// Number of pending offline operations.
  pub queue_size: usize,
  /// Timestamp of the last completed queue drain pass, ms since the epoch.
  pub last_sync: Option<i64>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_validity_boundary() {
    let entry = CacheEntry::new(json!({"id": "p1"}), 1_000);
    let t0 = entry.timestamp;

    assert!(entry.is_valid_at(t0 + 999));
    assert!(!entry.is_valid_at(t0 + 1_000));
    assert!(!entry.is_valid_at(t0 + 1_001));
  }

  #[test]
  fn test_version_tag() {
    let entry = CacheEntry::new(json!(null), 10);
    assert_eq!(entry.version, CACHE_SCHEMA_VERSION);
  }
}
