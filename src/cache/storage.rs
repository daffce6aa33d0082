//! Key-value storage trait and its SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::Database;

/// Trait for local storage backends.
///
/// Mirrors browser local storage: string keys, string values, no expiry.
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Delete `key`. Deleting a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-based key-value storage.
pub struct SqliteStore {
  db: Arc<Database>,
}

impl SqliteStore {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.db.conn()?;

    conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read key {}: {}", key, e))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.db.conn()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write key {}: {}", key, e))?;

    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.db.conn()?;

    conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete key {}: {}", key, e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> SqliteStore {
    SqliteStore::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  #[test]
  fn test_missing_key_reads_none() {
    assert_eq!(store().get("timezone").unwrap(), None);
  }

  #[test]
  fn test_set_replaces_value() {
    let store = store();
    store.set("timezone", "America/Denver").unwrap();
    store.set("timezone", "UTC").unwrap();
    assert_eq!(store.get("timezone").unwrap().as_deref(), Some("UTC"));
  }

  #[test]
  fn test_remove_missing_key_is_ok() {
    let store = store();
    store.remove("caseHistory").unwrap();
    store.set("caseHistory", "[]").unwrap();
    store.remove("caseHistory").unwrap();
    assert_eq!(store.get("caseHistory").unwrap(), None);
  }

  #[test]
  fn test_values_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("casewatch.db");

    {
      let store = SqliteStore::new(Arc::new(Database::open(&path).unwrap()));
      store.set("timezone", "Asia/Kolkata").unwrap();
    }

    let store = SqliteStore::new(Arc::new(Database::open(&path).unwrap()));
    assert_eq!(store.get("timezone").unwrap().as_deref(), Some("Asia/Kolkata"));
  }
}
