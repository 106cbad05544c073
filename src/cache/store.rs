//! Cache store trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use crate::net::FetchResponse;

/// A cached response snapshot plus its capture timestamp.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: FetchResponse,
  pub captured_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// Entries are keyed by namespace + normalized request identity and are
/// overwritten on every successful refresh (last writer wins).
pub trait CacheStore: Send + Sync {
  /// Create a namespace if it does not exist yet.
  fn open_namespace(&self, name: &str) -> Result<()>;

  /// Store a response snapshot, overwriting any previous entry.
  fn put(&self, namespace: &str, identity: &str, response: &FetchResponse) -> Result<()>;

  /// Look up the snapshot for a request identity.
  fn get(&self, namespace: &str, identity: &str) -> Result<Option<CachedResponse>>;

  /// All namespace names currently present, any generation.
  fn list_namespaces(&self) -> Result<Vec<String>>;

  /// Drop a namespace and every entry in it.
  fn delete_namespace(&self, name: &str) -> Result<()>;

  /// Number of entries in a namespace.
  fn namespace_len(&self, name: &str) -> Result<usize>;
}

/// SQLite-based cache store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open a store at the given path, creating parent directories as needed.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_conn(conn)
  }

  /// In-memory store, used by tests.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory cache: {}", e))?;
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
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots, keyed by namespace + request identity hash
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    identity_hash TEXT NOT NULL,
    identity TEXT NOT NULL,
    data BLOB NOT NULL,
    captured_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, identity_hash)
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_namespace ON cache_entries(namespace);
"#;

impl CacheStore for SqliteStore {
  fn open_namespace(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open namespace {}: {}", name, e))?;

    Ok(())
  }

  fn put(&self, namespace: &str, identity: &str, response: &FetchResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize response: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
        params![namespace],
      )
      .map_err(|e| eyre!("Failed to open namespace {}: {}", namespace, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (namespace, identity_hash, identity, data, captured_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![namespace, identity_hash(identity), identity, data],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get(&self, namespace: &str, identity: &str) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, captured_at FROM cache_entries
         WHERE namespace = ? AND identity_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(Vec<u8>, String)> = stmt
      .query_row(params![namespace, identity_hash(identity)], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to query cache entry: {}", e))?;

    match row {
      Some((data, captured_at_str)) => {
        let response: FetchResponse = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cached response: {}", e))?;
        let captured_at = parse_datetime(&captured_at_str)?;
        Ok(Some(CachedResponse {
          response,
          captured_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn list_namespaces(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_namespaces ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list namespaces: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn delete_namespace(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cache_entries WHERE namespace = ?",
        params![name],
      )
      .map_err(|e| eyre!("Failed to delete entries of {}: {}", name, e))?;

    conn
      .execute("DELETE FROM cache_namespaces WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete namespace {}: {}", name, e))?;

    Ok(())
  }

  fn namespace_len(&self, name: &str) -> Result<usize> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?",
        params![name],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of {}: {}", name, e))?;

    Ok(count as usize)
  }
}

/// SHA256 hash of a request identity, for stable fixed-length keys.
fn identity_hash(identity: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(identity.as_bytes());
  hex::encode(hasher.finalize())
}

/// Parse a datetime string from SQLite format.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
