//! In-memory backend implementation.
//!
//! Used by tests and offline demos. Rows live in a plain map of tables;
//! `insert_unique` enforces its conflict columns the way a database unique
//! constraint would.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::{Backend, Filter, InsertOutcome, Row};

/// In-process table store.
#[derive(Default)]
pub struct MemoryBackend {
  tables: Mutex<HashMap<String, Vec<Row>>>,
  /// Tables whose operations fail unconditionally. Used to simulate a
  /// backend outage for retry/drain testing.
  failing: Mutex<HashSet<String>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every operation against `table` return an error.
  pub fn set_failing(&self, table: &str, failing: bool) {
    let mut set = self.failing.lock().unwrap_or_else(|e| e.into_inner());
    if failing {
      set.insert(table.to_string());
    } else {
      set.remove(table);
    }
  }

  /// Number of rows currently stored in `table`.
  pub fn row_count(&self, table: &str) -> usize {
    let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    tables.get(table).map(Vec::len).unwrap_or(0)
  }

  fn check_available(&self, table: &str) -> Result<()> {
    let set = self.failing.lock().unwrap_or_else(|e| e.into_inner());
    if set.contains(table) {
      return Err(eyre!("Backend unavailable for table {}", table));
    }
    Ok(())
  }
}

#[async_trait]
impl Backend for MemoryBackend {
  async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
    self.check_available(table)?;
    let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    let rows = tables
      .get(table)
      .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
      .unwrap_or_default();
    Ok(rows)
  }

  async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
    self.check_available(table)?;
    let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    if !row.contains_key("id") {
      row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    tables
      .entry(table.to_string())
      .or_default()
      .push(row.clone());
    Ok(row)
  }

  async fn insert_unique(
    &self,
    table: &str,
    mut row: Row,
    conflict_columns: &[&str],
  ) -> Result<InsertOutcome> {
    self.check_available(table)?;
    let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    let rows = tables.entry(table.to_string()).or_default();

    let conflict = rows.iter().any(|existing| {
      conflict_columns
        .iter()
        .all(|column| existing.get(*column) == row.get(*column))
    });
    if conflict {
      return Ok(InsertOutcome::Conflict);
    }

    if !row.contains_key("id") {
      row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    rows.push(row);
    Ok(InsertOutcome::Inserted)
  }

  async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()> {
    self.check_available(table)?;
    let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    let rows = tables
      .get_mut(table)
      .ok_or_else(|| eyre!("Unknown table {}", table))?;

    let row = rows
      .iter_mut()
      .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
      .ok_or_else(|| eyre!("No row with id {} in table {}", id, table))?;

    for (column, value) in patch {
      row.insert(column, value);
    }
    Ok(())
  }

  async fn delete(&self, table: &str, id: &str) -> Result<()> {
    self.check_available(table)?;
    let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(rows) = tables.get_mut(table) {
      rows.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.clone()))
      .collect()
  }

  #[tokio::test]
  async fn test_select_applies_filter() {
    let backend = MemoryBackend::new();
    backend
      .insert("properties", row(&[("id", json!("p1")), ("city", json!("Lisbon"))]))
      .await
      .unwrap();
    backend
      .insert("properties", row(&[("id", json!("p2")), ("city", json!("Porto"))]))
      .await
      .unwrap();

    let filter = Filter::new().eq("city", "Lisbon");
    let rows = backend.select("properties", &filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!("p1")));
  }

  #[tokio::test]
  async fn test_insert_unique_detects_conflict() {
    let backend = MemoryBackend::new();
    let task = row(&[
      ("booking_id", json!("b1")),
      ("task_type", json!("Standard Cleaning")),
      ("due_date", json!("2024-06-01")),
    ]);

    let first = backend
      .insert_unique("tasks", task.clone(), &["booking_id", "task_type", "due_date"])
      .await
      .unwrap();
    assert_eq!(first, InsertOutcome::Inserted);

    let second = backend
      .insert_unique("tasks", task, &["booking_id", "task_type", "due_date"])
      .await
      .unwrap();
    assert_eq!(second, InsertOutcome::Conflict);
    assert_eq!(backend.row_count("tasks"), 1);
  }

  #[tokio::test]
  async fn test_failing_table_errors() {
    let backend = MemoryBackend::new();
    backend.set_failing("bookings", true);
    let result = backend.select("bookings", &Filter::new()).await;
    assert!(result.is_err());

    backend.set_failing("bookings", false);
    assert!(backend.select("bookings", &Filter::new()).await.is_ok());
  }

  #[tokio::test]
  async fn test_update_and_delete_by_id() {
    let backend = MemoryBackend::new();
    backend
      .insert("bookings", row(&[("id", json!("b1")), ("guest_name", json!("Ana"))]))
      .await
      .unwrap();

    backend
      .update("bookings", "b1", row(&[("guest_name", json!("Maria"))]))
      .await
      .unwrap();
    let rows = backend.select("bookings", &Filter::new()).await.unwrap();
    assert_eq!(rows[0].get("guest_name"), Some(&json!("Maria")));

    backend.delete("bookings", "b1").await.unwrap();
    assert_eq!(backend.row_count("bookings"), 0);

    // Deleting a missing row is a no-op
    backend.delete("bookings", "b1").await.unwrap();
  }
}
