//! Sync queue storage trait and implementations.
//!
//! The memory store reproduces the original session-scoped queue: pending
//! writes are lost on restart. The SQLite store persists the queue so that
//! writes buffered while offline survive an application reload.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::queue::QueueItem;

/// Storage backend for the FIFO sync queue.
pub trait QueueStore: Send + Sync {
  /// Append an item at the tail.
  fn push(&self, item: &QueueItem) -> Result<()>;

  /// All items in FIFO order.
  fn items(&self) -> Result<Vec<QueueItem>>;

  /// Persist updated retry bookkeeping for an item, keeping its position.
  fn update(&self, item: &QueueItem) -> Result<()>;

  /// Remove an item by id.
  fn remove(&self, id: &str) -> Result<()>;

  fn clear(&self) -> Result<()>;

  fn len(&self) -> Result<usize>;
}

/// Memory-only queue store (original behavior, default).
#[derive(Default)]
pub struct MemoryQueueStore {
  items: Mutex<VecDeque<QueueItem>>,
}

impl MemoryQueueStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl QueueStore for MemoryQueueStore {
  fn push(&self, item: &QueueItem) -> Result<()> {
    let mut items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.push_back(item.clone());
    Ok(())
  }

  fn items(&self) -> Result<Vec<QueueItem>> {
    let items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.iter().cloned().collect())
  }

  fn update(&self, item: &QueueItem) -> Result<()> {
    let mut items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
      *existing = item.clone();
    }
    Ok(())
  }

  fn remove(&self, id: &str) -> Result<()> {
    let mut items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.retain(|i| i.id != id);
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.clear();
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let items = self.items.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.len())
  }
}

/// Schema for the durable queue.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sync_queue (
    id TEXT PRIMARY KEY,
    operation TEXT NOT NULL,
    table_name TEXT NOT NULL,
    data TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL,
    next_attempt_at INTEGER NOT NULL,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_queue_position ON sync_queue(position);
"#;

/// SQLite-backed durable queue store.
pub struct SqliteQueueStore {
  conn: Mutex<Connection>,
}

impl SqliteQueueStore {
  /// Open (or create) the queue database at the given path.
  pub fn open(path: &std::path::Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create queue directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open queue database at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Open the queue database at the default location.
  pub fn open_default() -> Result<Self> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Self::open(&data_dir.join("staysync").join("queue.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(QUEUE_SCHEMA)
      .map_err(|e| eyre!("Failed to run queue migrations: {}", e))?;

    Ok(())
  }

  fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueItem> {
    let operation: String = row.get(1)?;
    let data: String = row.get(3)?;
    Ok(QueueItem {
      id: row.get(0)?,
      operation: operation.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(1, "operation".to_string(), rusqlite::types::Type::Text)
      })?,
      table: row.get(2)?,
      data: serde_json::from_str(&data).map_err(|_| {
        rusqlite::Error::InvalidColumnType(3, "data".to_string(), rusqlite::types::Type::Text)
      })?,
      timestamp: row.get(4)?,
      retry_count: row.get(5)?,
      max_retries: row.get(6)?,
      next_attempt_at: row.get(7)?,
    })
  }
}

impl QueueStore for SqliteQueueStore {
  fn push(&self, item: &QueueItem) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_string(&item.data).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    conn
      .execute(
        "INSERT INTO sync_queue (id, operation, table_name, data, timestamp, retry_count, max_retries, next_attempt_at, position)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, COALESCE((SELECT MAX(position) + 1 FROM sync_queue), 0))",
        params![
          item.id,
          item.operation.as_str(),
          item.table,
          data,
          item.timestamp,
          item.retry_count,
          item.max_retries,
          item.next_attempt_at,
        ],
      )
      .map_err(|e| eyre!("Failed to enqueue item: {}", e))?;

    Ok(())
  }

  fn items(&self) -> Result<Vec<QueueItem>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT id, operation, table_name, data, timestamp, retry_count, max_retries, next_attempt_at
         FROM sync_queue ORDER BY position",
      )
      .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

    let items: Vec<QueueItem> = stmt
      .query_map([], Self::row_to_item)
      .map_err(|e| eyre!("Failed to query queue: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(items)
  }

  fn update(&self, item: &QueueItem) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "UPDATE sync_queue SET retry_count = ?, next_attempt_at = ? WHERE id = ?",
        params![item.retry_count, item.next_attempt_at, item.id],
      )
      .map_err(|e| eyre!("Failed to update queue item: {}", e))?;

    Ok(())
  }

  fn remove(&self, id: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM sync_queue WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove queue item: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM sync_queue", [])
      .map_err(|e| eyre!("Failed to clear queue: {}", e))?;

    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count queue: {}", e))?;

    Ok(count as usize)
  }
}
