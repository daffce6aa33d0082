use crate::assets::{AssetCache, HttpFetcher};
use crate::cache::{next_timezone, HistoryCache, HistoryEntry, Preferences, SqliteStore};
use crate::case::{AuthStatus, CaseClient, CaseSource};
use crate::commands::{self, Action, Command};
use crate::event::{Event, EventHandler};
use crate::session::{InstallOutcome, InstallPrompt, InstallPromptHandle, Session};
use crate::ui;
use crate::view_model::CaseView;
use chrono::Utc;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use futures::future::BoxFuture;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  /// Typing a receipt number
  Receipt,
  Command,
  ConfirmClearHistory,
  ConfirmInstall,
}

/// One-line feedback shown under the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Error(String),
  Info(String),
}

/// Install prompt answered through the TUI confirm dialog
struct ConfirmInstallPrompt {
  event_tx: mpsc::UnboundedSender<Event>,
  answer: oneshot::Receiver<InstallOutcome>,
}

impl InstallPromptHandle for ConfirmInstallPrompt {
  fn prompt(self: Box<Self>) -> BoxFuture<'static, InstallOutcome> {
    let ConfirmInstallPrompt { event_tx, answer } = *self;
    Box::pin(async move {
      if event_tx.send(Event::InstallRequested).is_err() {
        return InstallOutcome::Dismissed;
      }
      answer.await.unwrap_or(InstallOutcome::Dismissed)
    })
  }
}

/// Services the app talks to
pub struct Services {
  pub client: CaseClient,
  pub history: HistoryCache<SqliteStore>,
  pub prefs: Preferences<SqliteStore>,
  pub assets: Option<AssetCache<HttpFetcher>>,
  pub skip_auth_check: bool,
}

/// Main application state
pub struct App {
  session: Session,
  services: Services,

  /// Current input mode
  mode: Mode,

  /// Receipt number being typed
  receipt_input: String,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  /// Saved cases, refreshed from storage after every change
  history: Vec<HistoryEntry>,
  selected_history: usize,

  notice: Option<Notice>,

  /// Reply channel for the install confirm dialog
  install_answer: Option<oneshot::Sender<InstallOutcome>>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(services: Services) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let session = Session::new(services.prefs.timezone());
    let history = services.history.list();

    Self {
      session,
      services,
      mode: Mode::Normal,
      receipt_input: String::new(),
      command_input: String::new(),
      selected_suggestion: 0,
      history,
      selected_history: 0,
      notice: None,
      install_answer: None,
      event_tx: tx,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    self.start();
    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  /// Startup work: auth probe and offline shell check
  fn start(&mut self) {
    if self.services.skip_auth_check {
      self.session.set_auth(AuthStatus::Authenticated);
    } else {
      self.probe_auth();
    }
    self.offer_install();
  }

  fn probe_auth(&self) {
    let client = self.services.client.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let status = client.probe_auth().await;
      let _ = tx.send(Event::Auth(status));
    });
  }

  /// Capture an install prompt when the offline shell is missing
  fn offer_install(&mut self) {
    let Some(assets) = &self.services.assets else {
      return;
    };

    match assets.is_installed() {
      Ok(true) => {}
      Ok(false) => {
        let (answer_tx, answer_rx) = oneshot::channel();
        self.install_answer = Some(answer_tx);
        self
          .session
          .capture_install_prompt(InstallPrompt::new(ConfirmInstallPrompt {
            event_tx: self.event_tx.clone(),
            answer: answer_rx,
          }));
      }
      Err(e) => warn!(error = %e, "could not inspect offline shell cache"),
    }
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {}
      Event::Auth(status) => {
        info!(?status, "auth status");
        self.session.set_auth(status);
      }
      Event::Lookup { receipt, outcome } => {
        let result = self
          .session
          .complete_check(receipt, outcome, &self.services.history);
        self.notice = result.err().map(|e| Notice::Error(e.to_string()));
        self.reload_history();
      }
      Event::InstallRequested => self.mode = Mode::ConfirmInstall,
      Event::InstallAnswered(outcome) => {
        if outcome == InstallOutcome::Dismissed {
          self.notice = Some(Notice::Info("Offline install dismissed".to_string()));
        }
      }
      Event::ShellInstalled(Ok(cache)) => {
        self.notice = Some(Notice::Info(format!("Offline shell installed ({})", cache)));
      }
      Event::ShellInstalled(Err(e)) => {
        self.notice = Some(Notice::Error(format!("Offline install failed: {}", e)));
        // The accepted prompt is spent; offer a fresh one so `i` can retry
        self.offer_install();
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Receipt => self.handle_receipt_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
      Mode::ConfirmClearHistory => {
        if key.code == KeyCode::Char('y') {
          self.clear_history();
        }
        self.mode = Mode::Normal;
      }
      Mode::ConfirmInstall => {
        let outcome = if key.code == KeyCode::Char('y') {
          InstallOutcome::Accepted
        } else {
          InstallOutcome::Dismissed
        };
        if let Some(answer) = self.install_answer.take() {
          let _ = answer.send(outcome);
        }
        self.mode = Mode::Normal;
      }
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('/') | KeyCode::Char('c') => self.perform(Action::Check),
      KeyCode::Char('x') => self.perform(Action::ClearResult),
      KeyCode::Char('D') => self.perform(Action::ClearHistory),
      KeyCode::Char('t') => self.perform(Action::Timezone),
      KeyCode::Char('i') => self.perform(Action::Install),
      KeyCode::Char('r') => self.perform(Action::Refresh),
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Enter => self.open_selected_history(),
      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }
      _ => {}
    }
  }

  fn handle_receipt_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => self.mode = Mode::Normal,
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        self.submit_receipt();
      }
      KeyCode::Backspace => {
        self.receipt_input.pop();
      }
      KeyCode::Char(c) => self.receipt_input.push(c.to_ascii_uppercase()),
      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.mode = Mode::Normal;
        self.execute_command();
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    let suggestions = commands::get_suggestions(&self.command_input);
    let action = suggestions.get(self.selected_suggestion).map(|cmd| cmd.action);
    self.command_input.clear();

    match action {
      Some(action) => self.perform(action),
      None => self.notice = Some(Notice::Error("Unknown command".to_string())),
    }
  }

  fn perform(&mut self, action: Action) {
    match action {
      Action::Check => {
        if !self.session.is_checking() {
          self.mode = Mode::Receipt;
        }
      }
      Action::History => {
        self.reload_history();
        self.selected_history = 0;
      }
      Action::ClearResult => {
        self.session.clear_result();
        self.receipt_input.clear();
        self.notice = None;
      }
      Action::ClearHistory => {
        if !self.history.is_empty() {
          self.mode = Mode::ConfirmClearHistory;
        }
      }
      Action::Timezone => self.cycle_timezone(),
      Action::Install => self.install(),
      Action::Refresh => {
        self.session.set_auth(AuthStatus::Unknown);
        self.probe_auth();
      }
      Action::Quit => self.should_quit = true,
    }
  }

  /// Start a lookup for the typed receipt number. The check action stays
  /// disabled until it resolves.
  fn submit_receipt(&mut self) {
    let receipt = match self.session.begin_check(&self.receipt_input) {
      Ok(receipt) => receipt,
      Err(e) => {
        self.notice = Some(Notice::Error(e.to_string()));
        return;
      }
    };

    self.notice = None;
    let client = self.services.client.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let outcome = client.fetch_case(&receipt).await;
      let _ = tx.send(Event::Lookup { receipt, outcome });
    });
  }

  fn install(&mut self) {
    let Some(assets) = self.services.assets.clone() else {
      self.notice = Some(Notice::Error(
        "No shell.base_url configured; nothing to install".to_string(),
      ));
      return;
    };

    let Some(prompt) = self.session.prompt_install() else {
      self.notice = Some(Notice::Info("Offline shell already installed".to_string()));
      return;
    };

    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let outcome = prompt.await;
      let _ = tx.send(Event::InstallAnswered(outcome));
      if outcome == InstallOutcome::Accepted {
        let live = assets.subscribe();
        let result = match assets.register().await {
          Ok(()) => Ok(live.borrow().clone().unwrap_or_default()),
          Err(e) => Err(e.to_string()),
        };
        let _ = tx.send(Event::ShellInstalled(result));
      }
    });
  }

  fn cycle_timezone(&mut self) {
    let tz = next_timezone(self.session.timezone());
    self.session.set_timezone(tz);
    if let Err(e) = self.services.prefs.set_timezone(tz) {
      warn!(error = %e, "failed to save timezone");
      self.notice = Some(Notice::Error(format!("Failed to save timezone: {}", e)));
    }
  }

  fn clear_history(&mut self) {
    if let Err(e) = self.services.history.clear() {
      self.notice = Some(Notice::Error(format!("Failed to clear history: {}", e)));
    }
    self.reload_history();
  }

  fn reload_history(&mut self) {
    self.history = self.services.history.list();
    if self.selected_history >= self.history.len() {
      self.selected_history = self.history.len().saturating_sub(1);
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.history.len();
    if len > 0 {
      self.selected_history = (self.selected_history as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn open_selected_history(&mut self) {
    let Some(entry) = self.history.get(self.selected_history).cloned() else {
      return;
    };
    self.receipt_input = entry.case_number.clone();
    if let Err(e) = self.session.show_history_entry(entry) {
      self.notice = Some(Notice::Error(e.to_string()));
    } else {
      self.notice = None;
    }
  }

  // Accessors for UI rendering
  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn case_view(&self) -> Option<CaseView> {
    self.session.view(Utc::now())
  }

  pub fn receipt_input(&self) -> &str {
    &self.receipt_input
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn history(&self) -> &[HistoryEntry] {
    &self.history
  }

  pub fn selected_history(&self) -> usize {
    self.selected_history
  }

  pub fn notice(&self) -> Option<&Notice> {
    self.notice.as_ref()
  }

  pub fn api_url(&self) -> &str {
    self.services.client.base_url()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}
