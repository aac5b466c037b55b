//! Backend client boundary.
//!
//! The cache/sync layer and the housekeeping generator both talk to the hosted
//! backend through the `Backend` trait: a minimal select/insert/update/delete
//! contract over named tables, keyed by row id. Any backend satisfying the
//! contract (REST, GraphQL, RPC) can substitute.

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use async_trait::async_trait;
use color_eyre::Result;
use serde_json::Value;

/// A single row, as returned by or sent to the backend.
pub type Row = serde_json::Map<String, Value>;

/// Column equality conditions, ANDed together.
#[derive(Debug, Clone, Default)]
pub struct Filter {
  conditions: Vec<(String, Value)>,
}

impl Filter {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a `column = value` condition.
  pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
    self.conditions.push((column.to_string(), value.into()));
    self
  }

  pub fn conditions(&self) -> &[(String, Value)] {
    &self.conditions
  }

  /// Check whether a row satisfies every condition.
  pub fn matches(&self, row: &Row) -> bool {
    self
      .conditions
      .iter()
      .all(|(column, value)| row.get(column) == Some(value))
  }
}

/// Outcome of a uniqueness-aware insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
  /// The row was inserted.
  Inserted,
  /// A row with the same values in the conflict columns already exists;
  /// nothing was written.
  Conflict,
}

/// Minimal query/write capability against named tables.
#[async_trait]
pub trait Backend: Send + Sync {
  /// Fetch all rows matching the filter.
  async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>>;

  /// Insert a row, returning the stored representation.
  async fn insert(&self, table: &str, row: Row) -> Result<Row>;

  /// Insert a row unless another row already matches it on `conflict_columns`.
  ///
  /// This is the atomic replacement for check-then-insert duplicate avoidance:
  /// the uniqueness decision happens in the backend, not in a separate read.
  async fn insert_unique(
    &self,
    table: &str,
    row: Row,
    conflict_columns: &[&str],
  ) -> Result<InsertOutcome>;

  /// Patch the row with the given id.
  async fn update(&self, table: &str, id: &str, patch: Row) -> Result<()>;

  /// Delete the row with the given id. Deleting a missing row is a no-op.
  async fn delete(&self, table: &str, id: &str) -> Result<()>;
}
