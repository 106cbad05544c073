//! Local persistence for offline operation: the pending sync queue and the
//! record mirror used by the fallback helper.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::cache::parse_datetime;

/// A write queued while offline (or after a failed online write), awaiting
/// replay against the live API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSyncItem {
  pub id: i64,
  pub method: String,
  pub url: String,
  pub body: Option<Vec<u8>>,
  pub queued_at: DateTime<Utc>,
}

/// Input shape for enqueueing: a pending item before it has an id.
#[derive(Debug, Clone)]
pub struct QueuedWrite {
  pub method: String,
  pub url: String,
  pub body: Option<Vec<u8>>,
}

/// SQLite-backed offline store.
///
/// Holds two tables: `pending_sync` (FIFO replay queue, drained by the sync
/// coordinator) and `offline_records` (key-value mirror of application data,
/// written by the fallback helper).
pub struct OfflineStore {
  conn: Mutex<Connection>,
}

impl OfflineStore {
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create offline storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open offline database at {}: {}", path.display(), e))?;

    Self::from_conn(conn)
  }

  /// In-memory store, used by tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory offline store: {}", e))?;
    Self::from_conn(conn)
  }

  fn from_conn(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(OFFLINE_SCHEMA)
      .map_err(|e| eyre!("Failed to run offline store migrations: {}", e))?;

    Ok(())
  }

  /// Queue a write for later replay. Returns the queue id.
  pub fn enqueue(&self, write: &QueuedWrite) -> Result<i64> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT INTO pending_sync (method, url, body, queued_at)
         VALUES (?, ?, ?, datetime('now'))",
        params![write.method, write.url, write.body],
      )
      .map_err(|e| eyre!("Failed to enqueue pending write: {}", e))?;

    Ok(conn.last_insert_rowid())
  }

  /// All queued items in FIFO order.
  pub fn pending(&self) -> Result<Vec<PendingSyncItem>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT id, method, url, body, queued_at FROM pending_sync ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<(i64, String, String, Option<Vec<u8>>, String)> = stmt
      .query_map([], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .map_err(|e| eyre!("Failed to read pending queue: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    let mut items = Vec::with_capacity(rows.len());
    for (id, method, url, body, queued_at) in rows {
      items.push(PendingSyncItem {
        id,
        method,
        url,
        body,
        queued_at: parse_datetime(&queued_at)?,
      });
    }

    Ok(items)
  }

  /// Remove an item after confirmed replay.
  pub fn remove(&self, id: i64) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM pending_sync WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove queue item {}: {}", id, e))?;

    Ok(())
  }

  pub fn queue_len(&self) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM pending_sync", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count pending queue: {}", e))?;

    Ok(count as usize)
  }

  /// Mirror a serialized record into local storage (overwrite-if-exists).
  pub fn put_record(&self, key: &str, data: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO offline_records (key, data, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![key, data],
      )
      .map_err(|e| eyre!("Failed to persist record {}: {}", key, e))?;

    Ok(())
  }

  pub fn get_record(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data = conn
      .query_row(
        "SELECT data FROM offline_records WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to load record {}: {}", key, e))?;

    Ok(data)
  }
}

/// Schema for offline persistence tables.
const OFFLINE_SCHEMA: &str = r#"
-- Writes awaiting replay, drained FIFO by id
CREATE TABLE IF NOT EXISTS pending_sync (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    body BLOB,
    queued_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Local mirror of application records
CREATE TABLE IF NOT EXISTS offline_records (
    key TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
