//! Timezone preference.

use chrono_tz::Tz;
use color_eyre::Result;
use std::sync::Arc;
use tracing::warn;

use super::storage::KeyValueStore;
use crate::config::DEFAULT_TIMEZONE;

/// Storage key holding the timezone name
pub const TIMEZONE_KEY: &str = "timezone";

/// Timezones offered for selection, in display order
pub const TIMEZONES: &[&str] = &[
  "America/New_York",
  "America/Chicago",
  "America/Denver",
  "America/Phoenix",
  "America/Los_Angeles",
  "America/Anchorage",
  "Pacific/Honolulu",
  "UTC",
  "Europe/London",
  "Asia/Kolkata",
];

/// Parse an IANA timezone name
pub fn parse_timezone(name: &str) -> Option<Tz> {
  name.parse().ok()
}

/// The timezone after `current` in the selection list, wrapping around.
/// A timezone outside the list moves to the first one.
pub fn next_timezone(current: Tz) -> Tz {
  let position = TIMEZONES.iter().position(|name| *name == current.name());
  let next = match position {
    Some(i) => TIMEZONES[(i + 1) % TIMEZONES.len()],
    None => TIMEZONES[0],
  };
  parse_timezone(next).unwrap_or(current)
}

/// Persisted user preferences
pub struct Preferences<S: KeyValueStore> {
  storage: Arc<S>,
  fallback: Tz,
}

impl<S: KeyValueStore> Preferences<S> {
  /// `default_timezone` applies until the user picks one; an invalid name
  /// falls back to America/Chicago.
  pub fn new(storage: Arc<S>, default_timezone: &str) -> Self {
    let fallback = parse_timezone(default_timezone).unwrap_or_else(|| {
      warn!(timezone = default_timezone, "unknown default timezone");
      chrono_tz::America::Chicago
    });
    Self { storage, fallback }
  }

  /// The saved timezone, or the default when none is saved or it is invalid
  pub fn timezone(&self) -> Tz {
    match self.storage.get(TIMEZONE_KEY) {
      Ok(Some(name)) => parse_timezone(&name).unwrap_or_else(|| {
        warn!(timezone = %name, "ignoring unknown saved timezone");
        self.fallback
      }),
      Ok(None) => self.fallback,
      Err(e) => {
        warn!(error = %e, "timezone preference unreadable");
        self.fallback
      }
    }
  }

  pub fn set_timezone(&self, tz: Tz) -> Result<()> {
    self.storage.set(TIMEZONE_KEY, tz.name())
  }
}
