mod app;
mod assets;
mod cache;
mod case;
mod cli;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod session;
mod ui;
mod view_model;

use app::{App, Services};
use assets::AssetCache;
use cache::{HistoryCache, Preferences, SqliteStore};
use case::CaseClient;
use clap::Parser;
use color_eyre::Result;
use config::Config;
use db::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "casewatch")]
#[command(about = "Track USCIS case status from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/casewatch/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Assume the USCIS session is valid instead of probing it
  #[arg(long, global = true)]
  skip_auth_check: bool,

  /// Keep history and preferences in memory only
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Option<cli::Commands>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let data_dir = Config::data_dir()?;
  let _log_guard = logging::init(&data_dir.join("logs"))?;
  info!(version = env!("CARGO_PKG_VERSION"), "casewatch starting");

  let db = if args.ephemeral {
    Database::open_in_memory()?
  } else {
    Database::open(&data_dir.join("casewatch.db"))?
  };
  let db = Arc::new(db);

  let services = build_services(&config, db, args.skip_auth_check)?;

  match args.command {
    Some(command) => cli::run(command, services).await,
    None => {
      let mut app = App::new(services);
      app.run().await
    }
  }
}

fn build_services(config: &Config, db: Arc<Database>, skip_auth_check: bool) -> Result<Services> {
  let store = Arc::new(SqliteStore::new(db.clone()));

  let assets = match &config.shell.base_url {
    Some(_) => Some(AssetCache::from_config(config, db)?),
    None => None,
  };

  Ok(Services {
    client: CaseClient::new(config)?,
    history: HistoryCache::new(store.clone()),
    prefs: Preferences::new(store, config.default_timezone()),
    assets,
    skip_auth_check,
  })
}
