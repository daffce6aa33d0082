//! Local persistent storage: case history and user preferences.
//!
//! Everything lives in a browser-style key-value store:
//! - `caseHistory`: JSON list of the last lookups, most recent first
//! - `timezone`: IANA name used to render dates

mod history;
mod prefs;
mod storage;

pub use history::{HistoryCache, HistoryEntry};
pub use prefs::{next_timezone, Preferences};
pub use storage::{KeyValueStore, SqliteStore};
