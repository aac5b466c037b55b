//! In-memory TTL cache map.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use super::entry::CacheEntry;

/// Keyed map of cache entries with TTL expiry.
///
/// Keys are opaque, caller-defined strings, typically a table name plus a
/// query signature (e.g. "properties:active"). Eviction happens lazily on
/// stale reads and in bulk via `sweep_expired`.
pub struct CacheStore {
  entries: HashMap<String, CacheEntry>,
  default_ttl_ms: i64,
}

impl CacheStore {
  pub fn new(default_ttl_ms: i64) -> Self {
    Self {
      entries: HashMap::new(),
      default_ttl_ms,
    }
  }

  /// Get a cached value if present and unexpired. A stale hit evicts the
  /// entry and reports a miss; the caller re-fetches on a miss.
  pub fn get(&mut self, key: &str) -> Option<Value> {
    self.get_at(key, Utc::now().timestamp_millis())
  }

  fn get_at(&mut self, key: &str, now_ms: i64) -> Option<Value> {
    match self.entries.get(key) {
      Some(entry) if entry.is_valid_at(now_ms) => Some(entry.data.clone()),
      Some(_) => {
        // Lazy eviction on stale hit
        self.entries.remove(key);
        tracing::debug!(key, "evicted stale cache entry on read");
        None
      }
      None => None,
    }
  }

  /// Cache a value with the default TTL, overwriting any existing entry.
  pub fn set(&mut self, key: &str, data: Value) {
    self.set_with_ttl(key, data, self.default_ttl_ms);
  }

  /// Cache a value with an explicit TTL, stamping a fresh timestamp.
  pub fn set_with_ttl(&mut self, key: &str, data: Value, ttl_ms: i64) {
    self
      .entries
      .insert(key.to_string(), CacheEntry::new(data, ttl_ms));
  }

  /// Delete a single entry if present; no-op otherwise.
  pub fn remove(&mut self, key: &str) {
    self.entries.remove(key);
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Remove every entry whose key matches the regular expression.
  /// Returns the number of entries removed.
  pub fn invalidate_pattern(&mut self, pattern: &str) -> Result<usize> {
    let regex =
      Regex::new(pattern).map_err(|e| eyre!("Invalid invalidation pattern {}: {}", pattern, e))?;

    let before = self.entries.len();
    self.entries.retain(|key, _| !regex.is_match(key));
    Ok(before - self.entries.len())
  }

  /// Remove all expired entries. Returns the number evicted.
  pub fn sweep_expired(&mut self) -> usize {
    let now_ms = Utc::now().timestamp_millis();
    let before = self.entries.len();
    self.entries.retain(|_, entry| entry.is_valid_at(now_ms));
    before - self.entries.len()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_ttl_boundary() {
    let mut store = CacheStore::new(300_000);
    store.set_with_ttl("properties:1", json!({"id": "p1"}), 1_000);

    // Exact expiry boundaries are covered by the CacheEntry tests; here the
    // probe times leave slack for the milliseconds between set and now.
    let t0 = Utc::now().timestamp_millis();
    assert_eq!(store.get_at("properties:1", t0 + 500), Some(json!({"id": "p1"})));
    assert_eq!(store.get_at("properties:1", t0 + 1_500), None);
    // The stale read evicted the entry
    assert_eq!(store.len(), 0);
  }

  #[test]
  fn test_set_overwrites_with_fresh_timestamp() {
    let mut store = CacheStore::new(300_000);
    store.set("bookings:june", json!([1]));
    store.set("bookings:june", json!([1, 2]));

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("bookings:june"), Some(json!([1, 2])));
  }

  #[test]
  fn test_remove_missing_is_noop() {
    let mut store = CacheStore::new(300_000);
    store.remove("nothing");
    assert!(store.is_empty());
  }

  #[test]
  fn test_pattern_invalidation() {
    let mut store = CacheStore::new(300_000);
    store.set("properties:1", json!(1));
    store.set("properties:2", json!(2));
    store.set("bookings:1", json!(3));

    let removed = store.invalidate_pattern("^properties:").unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.get("properties:1"), None);
    assert_eq!(store.get("properties:2"), None);
    assert_eq!(store.get("bookings:1"), Some(json!(3)));
  }

  #[test]
  fn test_invalid_pattern_is_error() {
    let mut store = CacheStore::new(300_000);
    store.set("properties:1", json!(1));
    assert!(store.invalidate_pattern("[unclosed").is_err());
    // Nothing was removed
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn test_sweep_removes_only_expired() {
    let mut store = CacheStore::new(300_000);
    store.set_with_ttl("old", json!(1), -1);
    store.set_with_ttl("fresh", json!(2), 60_000);

    assert_eq!(store.sweep_expired(), 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("fresh"), Some(json!(2)));
  }
}
