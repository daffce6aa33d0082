//! Scripted subcommands that run without the TUI.

use crate::app::Services;
use crate::assets::ServedFrom;
use crate::case::AuthStatus;
use crate::session::Session;
use chrono::Utc;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Look up one receipt number and report what changed since the last check
  Check {
    /// Receipt number, e.g. IOE0934989946
    receipt: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
  },

  /// List saved cases, most recent first
  History {
    #[command(subcommand)]
    action: Option<HistoryAction>,

    /// Print the history as JSON
    #[arg(long)]
    json: bool,
  },

  /// Manage the offline copy of the web shell
  Shell {
    #[command(subcommand)]
    action: ShellAction,
  },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
  /// Forget every saved case
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum ShellAction {
  /// Fetch the whole manifest into the current cache
  Install,
  /// Make the current cache the only one
  Activate,
  /// Serve one URL the way the offline shell would
  Fetch { url: String },
}

#[derive(Serialize)]
struct CheckReport<'a> {
  first_check: bool,
  changed: &'a [String],
  case: crate::view_model::CaseView,
}

pub async fn run(command: Commands, services: Services) -> Result<()> {
  match command {
    Commands::Check { receipt, json } => check(services, &receipt, json).await,
    Commands::History { action, json } => history(services, action, json),
    Commands::Shell { action } => shell(services, action).await,
  }
}

async fn check(services: Services, input: &str, json: bool) -> Result<()> {
  let mut session = Session::new(services.prefs.timezone());

  if services.skip_auth_check {
    session.set_auth(AuthStatus::Authenticated);
  } else if session.probe_auth(&services.client).await == AuthStatus::NotAuthenticated {
    return Err(eyre!(
      "Not logged in to USCIS. Log in at my.uscis.gov and set CASEWATCH_SESSION_COOKIE"
    ));
  }

  session
    .check_case(&services.client, &services.history, input)
    .await
    .map_err(|e| eyre!("{}", e))?;

  let flags = session.change_flags();
  let view = session
    .view(Utc::now())
    .ok_or_else(|| eyre!("Lookup finished without a result"))?;
  let report = CheckReport {
    first_check: session.previous().is_none(),
    changed: flags.changed_fields(),
    case: view,
  };

  if json {
    let out = serde_json::to_string_pretty(&report)
      .map_err(|e| eyre!("Failed to serialize result: {}", e))?;
    println!("{}", out);
    return Ok(());
  }

  print_case(&report);
  Ok(())
}

fn print_case(report: &CheckReport) {
  let view = &report.case;
  println!("{}  ({})", view.receipt, view.service_center);
  if let Some(status) = view.status {
    println!("Status: {:?}", status);
  }
  if view.action_required {
    println!("ACTION REQUIRED");
  }
  if let Some(form) = &view.form {
    println!(
      "Form: {} {}",
      form.code.as_deref().unwrap_or(""),
      form.name.as_deref().unwrap_or("")
    );
  }
  for row in view.applicant.iter().chain(&view.dates).chain(&view.details) {
    println!("{}: {}", row.label, row.value);
  }
  if let Some(notices) = &view.notices {
    println!("Notices: {}{}", notices.items.len(), new_marker(notices.is_new));
  }
  if let Some(events) = &view.events {
    println!("Events: {}{}", events.items.len(), new_marker(events.is_new));
    for event in &events.items {
      println!(
        "  {} {}",
        event.code.as_deref().unwrap_or("-"),
        event.date.as_deref().or(event.created.as_deref()).unwrap_or("")
      );
    }
  }

  if report.first_check {
    println!("First check for this case; saved for next time.");
  } else if report.changed.is_empty() {
    println!("No changes since last check.");
  } else {
    println!("Changed since last check: {}", report.changed.join(", "));
  }
}

fn new_marker(is_new: bool) -> &'static str {
  if is_new {
    " (NEW)"
  } else {
    ""
  }
}

fn history(services: Services, action: Option<HistoryAction>, json: bool) -> Result<()> {
  if let Some(HistoryAction::Clear) = action {
    services.history.clear()?;
    println!("History cleared");
    return Ok(());
  }

  let entries = services.history.list();
  if json {
    let out = serde_json::to_string_pretty(&entries)
      .map_err(|e| eyre!("Failed to serialize history: {}", e))?;
    println!("{}", out);
    return Ok(());
  }

  if entries.is_empty() {
    println!("No saved cases");
  }
  let tz = services.prefs.timezone();
  for entry in entries {
    println!(
      "{}  {}  {}",
      entry.case_number,
      entry.data.form_type().unwrap_or("-"),
      entry.timestamp.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
    );
  }
  Ok(())
}

async fn shell(services: Services, action: ShellAction) -> Result<()> {
  let assets = services
    .assets
    .ok_or_else(|| eyre!("No shell.base_url configured"))?;

  match action {
    ShellAction::Install => {
      let count = assets.install().await?;
      for url in assets.manifest() {
        println!("cached {}", url);
      }
      println!("Installed {} files into {}", count, assets.cache_name());
    }
    ShellAction::Activate => {
      if !assets.is_installed()? {
        return Err(eyre!(
          "Cache {} is not installed; run `casewatch shell install` first",
          assets.cache_name()
        ));
      }
      for name in assets.activate()? {
        println!("deleted {}", name);
      }
      println!("Activated {}", assets.cache_name());
    }
    ShellAction::Fetch { url } => {
      let served = assets.fetch(&url).await?;
      info!(url = %url, from = ?served.from, status = served.asset.status, "served");
      let source = match served.from {
        ServedFrom::Cache => "cache",
        ServedFrom::Network => "network",
      };
      eprintln!("{} {} ({})", served.asset.status, url, source);
      std::io::stdout()
        .write_all(&served.asset.body)
        .map_err(|e| eyre!("Failed to write response body: {}", e))?;
    }
  }
  info!(cache = %assets.cache_name(), state = ?assets.lifecycle(), "shell command finished");
  Ok(())
}
