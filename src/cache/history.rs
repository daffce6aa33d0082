//! Bounded, deduplicated, most-recent-first history of case lookups.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::KeyValueStore;
use crate::case::CaseRecord;

/// Storage key holding the serialized history list
pub const HISTORY_KEY: &str = "caseHistory";

/// How many lookups are remembered
pub const MAX_ENTRIES: usize = 10;

/// One remembered lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub case_number: String,
  pub data: CaseRecord,
  pub timestamp: DateTime<Utc>,
}

/// History of looked-up cases kept in local storage.
///
/// Nothing is held in memory: every read goes back to storage so callers
/// always see the latest persisted state.
pub struct HistoryCache<S: KeyValueStore> {
  storage: Arc<S>,
  max_entries: usize,
}

impl<S: KeyValueStore> HistoryCache<S> {
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      max_entries: MAX_ENTRIES,
    }
  }

  /// All entries, most recent first.
  ///
  /// Unreadable or corrupt storage reads as an empty history.
  pub fn list(&self) -> Vec<HistoryEntry> {
    let raw = match self.storage.get(HISTORY_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!(error = %e, "history unreadable, treating as empty");
        return Vec::new();
      }
    };

    match serde_json::from_str(&raw) {
      Ok(entries) => entries,
      Err(e) => {
        warn!(error = %e, "history corrupt, treating as empty");
        Vec::new()
      }
    }
  }

  /// Most recent entry for a case number
  pub fn get(&self, case_number: &str) -> Option<HistoryEntry> {
    self
      .list()
      .into_iter()
      .find(|entry| entry.case_number == case_number)
  }

  /// Remember a lookup, replacing any earlier entry for the same case.
  pub fn put(&self, case_number: &str, record: &CaseRecord) -> Result<()> {
    self.put_at(case_number, record, Utc::now())
  }

  fn put_at(&self, case_number: &str, record: &CaseRecord, observed_at: DateTime<Utc>) -> Result<()> {
    let mut entries = self.list();
    entries.retain(|entry| entry.case_number != case_number);
    entries.insert(
      0,
      HistoryEntry {
        case_number: case_number.to_string(),
        data: record.clone(),
        timestamp: observed_at,
      },
    );
    entries.truncate(self.max_entries);

    let raw =
      serde_json::to_string(&entries).map_err(|e| eyre!("Failed to serialize history: {}", e))?;
    self.storage.set(HISTORY_KEY, &raw)?;

    debug!(case_number, entries = entries.len(), "history updated");
    Ok(())
  }

  /// Forget everything.
  pub fn clear(&self) -> Result<()> {
    self.storage.remove(HISTORY_KEY)
  }
}

impl<S: KeyValueStore> Clone for HistoryCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      max_entries: self.max_entries,
    }
  }
}
