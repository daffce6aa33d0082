use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::case::{AuthStatus, CaseRecord, LookupError, ReceiptNumber};
use crate::session::InstallOutcome;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Auth probe finished
  Auth(AuthStatus),
  /// Case lookup finished
  Lookup {
    receipt: ReceiptNumber,
    outcome: Result<CaseRecord, LookupError>,
  },
  /// The install prompt wants the user's answer
  InstallRequested,
  /// The user answered the install prompt
  InstallAnswered(InstallOutcome),
  /// Offline shell install/activate finished
  ShellInstalled(Result<String, String>),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal polling blocks, so it gets its own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if input_tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks to report back on
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
