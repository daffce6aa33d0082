//! Per-run session state: what is on screen, what was there before, and the
//! user's display settings.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::cache::{HistoryCache, HistoryEntry, KeyValueStore};
use crate::case::{AuthStatus, CaseRecord, CaseSource, ChangeFlags, LookupError, ReceiptNumber};
use crate::view_model::CaseView;

/// How the user answered the install prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
  Accepted,
  Dismissed,
}

/// Platform handle that shows an install dialog when invoked.
pub trait InstallPromptHandle: Send {
  fn prompt(self: Box<Self>) -> BoxFuture<'static, InstallOutcome>;
}

/// A deferred install prompt; usable once.
pub struct InstallPrompt(Box<dyn InstallPromptHandle>);

impl InstallPrompt {
  pub fn new(handle: impl InstallPromptHandle + 'static) -> Self {
    Self(Box::new(handle))
  }
}

impl std::fmt::Debug for InstallPrompt {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("InstallPrompt")
  }
}

/// The record currently displayed
#[derive(Debug, Clone)]
pub struct Displayed {
  pub receipt: ReceiptNumber,
  pub record: CaseRecord,
}

/// Session context passed to rendering and caching code.
#[derive(Debug)]
pub struct Session {
  current: Option<Displayed>,
  previous: Option<CaseRecord>,
  timezone: Tz,
  auth: AuthStatus,
  checking: bool,
  install_prompt: Option<InstallPrompt>,
}

impl Session {
  pub fn new(timezone: Tz) -> Self {
    Self {
      current: None,
      previous: None,
      timezone,
      auth: AuthStatus::Unknown,
      checking: false,
      install_prompt: None,
    }
  }

  pub fn current(&self) -> Option<&Displayed> {
    self.current.as_ref()
  }

  pub fn previous(&self) -> Option<&CaseRecord> {
    self.previous.as_ref()
  }

  pub fn timezone(&self) -> Tz {
    self.timezone
  }

  pub fn set_timezone(&mut self, timezone: Tz) {
    self.timezone = timezone;
  }

  pub fn auth(&self) -> AuthStatus {
    self.auth
  }

  pub fn set_auth(&mut self, auth: AuthStatus) {
    self.auth = auth;
  }

  /// Whether a lookup is in flight; a second one must not start meanwhile
  pub fn is_checking(&self) -> bool {
    self.checking
  }

  /// Change flags between the previous and current record
  pub fn change_flags(&self) -> ChangeFlags {
    ChangeFlags::compute(
      self.previous.as_ref(),
      self.current.as_ref().map(|d| &d.record),
    )
  }

  /// View-model of the displayed record
  pub fn view(&self, now: DateTime<Utc>) -> Option<CaseView> {
    let displayed = self.current.as_ref()?;
    Some(CaseView::build(
      &displayed.receipt,
      &displayed.record,
      &self.change_flags(),
      self.timezone,
      now,
    ))
  }

  /// Ask the API whether the session is accepted and remember the answer
  pub async fn probe_auth<C: CaseSource + ?Sized>(&mut self, source: &C) -> AuthStatus {
    self.auth = source.probe_auth().await;
    self.auth
  }

  /// Validate input and mark a lookup as started.
  ///
  /// Nothing touches the network for input that fails validation, while the
  /// session is known to be logged out, or while another lookup is in flight.
  pub fn begin_check(&mut self, input: &str) -> Result<ReceiptNumber, LookupError> {
    if self.checking {
      return Err(LookupError::InFlight);
    }
    let receipt = ReceiptNumber::parse(input)?;
    if self.auth == AuthStatus::NotAuthenticated {
      return Err(LookupError::NotAuthenticated);
    }
    self.checking = true;
    Ok(receipt)
  }

  /// Apply the outcome of a lookup started with `begin_check`.
  ///
  /// On success the stored snapshot (if any) becomes `previous`, the fresh
  /// record becomes `current`, and history is updated.
  pub fn complete_check<S: KeyValueStore>(
    &mut self,
    receipt: ReceiptNumber,
    outcome: Result<CaseRecord, LookupError>,
    history: &HistoryCache<S>,
  ) -> Result<(), LookupError> {
    self.checking = false;

    let record = match outcome {
      Ok(record) => record,
      Err(e) => {
        if e.is_auth() {
          self.auth = AuthStatus::NotAuthenticated;
        }
        info!(receipt = %receipt, error = %e, "lookup failed");
        return Err(e);
      }
    };

    self.previous = history.get(receipt.as_str()).map(|entry| entry.data);
    self.current = Some(Displayed {
      receipt: receipt.clone(),
      record: record.clone(),
    });

    let flags = self.change_flags();
    if flags.any() {
      info!(receipt = %receipt, changed = ?flags.changed_fields(), "case changed since last check");
    } else {
      info!(receipt = %receipt, "lookup succeeded");
    }

    history.put(receipt.as_str(), &record).map_err(|e| {
      warn!(error = %e, "failed to save history");
      LookupError::Storage(e.to_string())
    })
  }

  /// Validate, fetch and record one lookup end to end.
  pub async fn check_case<C, S>(
    &mut self,
    source: &C,
    history: &HistoryCache<S>,
    input: &str,
  ) -> Result<(), LookupError>
  where
    C: CaseSource + ?Sized,
    S: KeyValueStore,
  {
    let receipt = self.begin_check(input)?;
    let outcome = source.fetch_case(&receipt).await;
    self.complete_check(receipt, outcome, history)
  }

  /// Show a stored record. Nothing is compared against it.
  pub fn show_history_entry(&mut self, entry: HistoryEntry) -> Result<(), LookupError> {
    let receipt = ReceiptNumber::parse(&entry.case_number)?;
    self.previous = None;
    self.current = Some(Displayed {
      receipt,
      record: entry.data,
    });
    Ok(())
  }

  /// Drop the displayed record
  pub fn clear_result(&mut self) {
    self.current = None;
    self.previous = None;
  }

  /// Hold on to an install prompt until the user asks for it
  pub fn capture_install_prompt(&mut self, prompt: InstallPrompt) {
    self.install_prompt = Some(prompt);
  }

  pub fn can_install(&self) -> bool {
    self.install_prompt.is_some()
  }

  /// Show the install prompt. The handle is consumed; `None` if there is none.
  pub fn prompt_install(&mut self) -> Option<BoxFuture<'static, InstallOutcome>> {
    self.install_prompt.take().map(|InstallPrompt(handle)| handle.prompt())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStore;
  use crate::db::Database;
  use async_trait::async_trait;
  use serde_json::{json, Value};
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  /// Canned API answers per receipt, consumed in order
  #[derive(Default)]
  struct FakeSource {
    answers: Mutex<HashMap<String, Vec<Result<CaseRecord, LookupError>>>>,
    calls: AtomicUsize,
    auth: Option<AuthStatus>,
  }

  impl FakeSource {
    fn answer(self, receipt: &str, outcome: Result<Value, LookupError>) -> Self {
      let outcome = outcome.map(|v| serde_json::from_value(v).unwrap());
      self
        .answers
        .lock()
        .unwrap()
        .entry(receipt.to_string())
        .or_default()
        .push(outcome);
      self
    }
  }

  #[async_trait]
  impl CaseSource for FakeSource {
    async fn fetch_case(&self, receipt: &ReceiptNumber) -> Result<CaseRecord, LookupError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let mut answers = self.answers.lock().unwrap();
      let queue = answers.get_mut(receipt.as_str()).unwrap();
      queue.remove(0)
    }

    async fn probe_auth(&self) -> AuthStatus {
      self.auth.unwrap_or(AuthStatus::Authenticated)
    }
  }

  fn history() -> HistoryCache<SqliteStore> {
    HistoryCache::new(Arc::new(SqliteStore::new(Arc::new(
      Database::open_in_memory().unwrap(),
    ))))
  }

  const RECEIPT: &str = "IOE0934989946";

  #[tokio::test]
  async fn test_second_lookup_flags_new_event() {
    let source = FakeSource::default()
      .answer(
        RECEIPT,
        Ok(json!({"formType": "I-485", "events": [{"eventCode": "RFE"}]})),
      )
      .answer(
        RECEIPT,
        Ok(json!({"formType": "I-485", "events": [{"eventCode": "RFE"}, {"eventCode": "APR"}]})),
      );
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);

    session.check_case(&source, &history, RECEIPT).await.unwrap();
    assert!(session.previous().is_none());
    assert!(!session.change_flags().any());

    session.check_case(&source, &history, RECEIPT).await.unwrap();
    let flags = session.change_flags();
    assert!(flags.is_changed("events"));
    assert!(!flags.is_changed("notices"));
    assert!(!crate::case::changes::has_changed(
      session.previous(),
      session.current().map(|d| &d.record),
      "formType"
    ));

    let view = session.view(Utc::now()).unwrap();
    assert!(view.events.unwrap().is_new);

    assert_eq!(history.list().len(), 1);
    assert_eq!(
      history.get(RECEIPT).unwrap().data.array_field("events").unwrap().len(),
      2
    );
  }

  #[tokio::test]
  async fn test_invalid_input_never_hits_network() {
    let source = FakeSource::default();
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);

    let err = session
      .check_case(&source, &history, "ioe0934989946")
      .await
      .unwrap_err();
    assert!(matches!(err, LookupError::InvalidReceipt(_)));
    assert_eq!(
      session.check_case(&source, &history, "").await,
      Err(LookupError::EmptyReceipt)
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(!session.is_checking());
  }

  #[tokio::test]
  async fn test_auth_failure_flips_status() {
    let source = FakeSource::default().answer(RECEIPT, Err(LookupError::NotAuthenticated));
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);
    session.set_auth(AuthStatus::Authenticated);

    let err = session.check_case(&source, &history, RECEIPT).await.unwrap_err();
    assert_eq!(err, LookupError::NotAuthenticated);
    assert_eq!(session.auth(), AuthStatus::NotAuthenticated);
    assert!(session.current().is_none());
    assert!(history.list().is_empty());
  }

  #[tokio::test]
  async fn test_failed_lookup_keeps_previous_display() {
    let source = FakeSource::default()
      .answer(RECEIPT, Ok(json!({"formType": "I-130"})))
      .answer(RECEIPT, Err(LookupError::Http { status: 502 }));
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);

    session.check_case(&source, &history, RECEIPT).await.unwrap();
    let err = session.check_case(&source, &history, RECEIPT).await.unwrap_err();
    assert_eq!(err, LookupError::Http { status: 502 });
    assert_eq!(
      session.current().unwrap().record.form_type(),
      Some("I-130")
    );
    assert!(!session.is_checking());
  }

  #[tokio::test]
  async fn test_rejected_probe_blocks_lookup() {
    let source = FakeSource {
      auth: Some(AuthStatus::NotAuthenticated),
      ..FakeSource::default()
    };
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);

    assert_eq!(
      session.probe_auth(&source).await,
      AuthStatus::NotAuthenticated
    );
    assert_eq!(
      session.check_case(&source, &history, RECEIPT).await,
      Err(LookupError::NotAuthenticated)
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(session.current().is_none());
  }

  #[test]
  fn test_begin_check_marks_in_flight() {
    let mut session = Session::new(chrono_tz::UTC);
    let receipt = session.begin_check(RECEIPT).unwrap();
    assert!(session.is_checking());

    session
      .complete_check(receipt, Err(LookupError::NoData), &history())
      .unwrap_err();
    assert!(!session.is_checking());
  }

  #[tokio::test]
  async fn test_second_lookup_refused_while_in_flight() {
    let source = FakeSource::default().answer(RECEIPT, Ok(json!({"formType": "I-130"})));
    let history = history();
    let mut session = Session::new(chrono_tz::UTC);

    let receipt = session.begin_check(RECEIPT).unwrap();
    assert_eq!(session.begin_check(RECEIPT), Err(LookupError::InFlight));
    assert_eq!(
      session.check_case(&source, &history, "EAC2190012345").await,
      Err(LookupError::InFlight)
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(session.is_checking());

    let outcome = source.fetch_case(&receipt).await;
    session.complete_check(receipt, outcome, &history).unwrap();
    assert!(!session.is_checking());
    assert!(session.begin_check(RECEIPT).is_ok());
  }

  #[test]
  fn test_history_entry_shows_without_badges() {
    let history = history();
    let record: CaseRecord =
      serde_json::from_value(json!({"events": [{"eventCode": "APR"}]})).unwrap();
    history.put(RECEIPT, &record).unwrap();

    let mut session = Session::new(chrono_tz::UTC);
    session
      .show_history_entry(history.get(RECEIPT).unwrap())
      .unwrap();
    assert!(session.previous().is_none());
    assert!(!session.view(Utc::now()).unwrap().events.unwrap().is_new);

    session.clear_result();
    assert!(session.current().is_none());
    assert!(session.view(Utc::now()).is_none());
  }

  struct CountingPrompt(Arc<AtomicUsize>);

  impl InstallPromptHandle for CountingPrompt {
    fn prompt(self: Box<Self>) -> BoxFuture<'static, InstallOutcome> {
      self.0.fetch_add(1, Ordering::SeqCst);
      Box::pin(async { InstallOutcome::Accepted })
    }
  }

  #[tokio::test]
  async fn test_install_prompt_is_single_use() {
    let shown = Arc::new(AtomicUsize::new(0));
    let mut session = Session::new(chrono_tz::UTC);
    assert!(session.prompt_install().is_none());

    session.capture_install_prompt(InstallPrompt::new(CountingPrompt(Arc::clone(&shown))));
    assert!(session.can_install());

    let outcome = session.prompt_install().unwrap().await;
    assert_eq!(outcome, InstallOutcome::Accepted);
    assert_eq!(shown.load(Ordering::SeqCst), 1);
    assert!(!session.can_install());
    assert!(session.prompt_install().is_none());
  }
}
