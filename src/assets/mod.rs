//! Offline copy of the web shell.
//!
//! A fixed manifest of shell files is fetched into a named bucket so the
//! shell can be served without network access. Only one bucket generation
//! is kept: activating a new cache name deletes every other bucket.
//!
//! Requests to the case-status API never touch the cache.

mod fetcher;
mod store;

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::db::Database;

pub use fetcher::{Asset, AssetFetcher, HttpFetcher};
pub use store::AssetStore;

/// Where an asset cache is in its install/activate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install or activation failed; this generation will not be used
  Redundant,
}

/// Where a served asset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
  Cache,
  Network,
}

#[derive(Debug, Clone)]
pub struct Served {
  pub asset: Asset,
  pub from: ServedFrom,
}

/// Decides which requests must always go to the network
#[derive(Debug, Clone)]
pub struct BypassRules {
  path_markers: Vec<String>,
  hosts: Vec<String>,
}

impl BypassRules {
  pub fn new(api_base: &str) -> Self {
    let hosts = Url::parse(api_base)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .into_iter()
      .collect();

    Self {
      path_markers: vec!["/api/".to_string(), "/.netlify/functions/".to_string()],
      hosts,
    }
  }

  pub fn bypasses(&self, url: &str) -> bool {
    self.path_markers.iter().any(|m| url.contains(m.as_str()))
      || self.hosts.iter().any(|h| url.contains(h.as_str()))
  }
}

/// Resolve manifest entries against the shell base URL
pub fn resolve_manifest(base: &str, entries: &[String]) -> Result<Vec<Url>> {
  let mut base = Url::parse(base).map_err(|e| eyre!("Invalid shell base URL {}: {}", base, e))?;
  // Url::join drops the last segment unless the base ends with a slash
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }

  entries
    .iter()
    .map(|entry| {
      base
        .join(entry)
        .map_err(|e| eyre!("Invalid manifest entry {}: {}", entry, e))
    })
    .collect()
}

/// The offline asset cache.
///
/// Cloning is cheap; clones share storage, lifecycle and generation.
pub struct AssetCache<F: AssetFetcher> {
  store: Arc<AssetStore>,
  fetcher: Arc<F>,
  cache_name: String,
  manifest: Vec<Url>,
  bypass: BypassRules,
  lifecycle: Arc<watch::Sender<Lifecycle>>,
  /// Bucket that open consumers are currently served from
  generation: Arc<watch::Sender<Option<String>>>,
}

impl<F: AssetFetcher> Clone for AssetCache<F> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      fetcher: Arc::clone(&self.fetcher),
      cache_name: self.cache_name.clone(),
      manifest: self.manifest.clone(),
      bypass: self.bypass.clone(),
      lifecycle: Arc::clone(&self.lifecycle),
      generation: Arc::clone(&self.generation),
    }
  }
}

impl AssetCache<HttpFetcher> {
  /// Build the cache described by the `shell` section of the config.
  pub fn from_config(config: &Config, db: Arc<Database>) -> Result<Self> {
    let base = config
      .shell
      .base_url
      .as_deref()
      .ok_or_else(|| eyre!("No shell.base_url configured; nothing to cache offline"))?;
    let manifest = resolve_manifest(base, &config.shell.manifest)?;

    Ok(Self::new(
      AssetStore::new(db),
      HttpFetcher::new()?,
      &config.shell.cache_name,
      manifest,
      BypassRules::new(&config.api.base_url),
    ))
  }
}

impl<F: AssetFetcher> AssetCache<F> {
  pub fn new(
    store: AssetStore,
    fetcher: F,
    cache_name: &str,
    manifest: Vec<Url>,
    bypass: BypassRules,
  ) -> Self {
    let (lifecycle, _) = watch::channel(Lifecycle::Parsed);
    let (generation, _) = watch::channel(None);

    Self {
      store: Arc::new(store),
      fetcher: Arc::new(fetcher),
      cache_name: cache_name.to_string(),
      manifest,
      bypass,
      lifecycle: Arc::new(lifecycle),
      generation: Arc::new(generation),
    }
  }

  pub fn cache_name(&self) -> &str {
    &self.cache_name
  }

  pub fn manifest(&self) -> &[Url] {
    &self.manifest
  }

  pub fn lifecycle(&self) -> Lifecycle {
    *self.lifecycle.borrow()
  }

  /// Follow which bucket is live. Updated the moment a new generation
  /// activates, without waiting for consumers to reopen.
  pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
    self.generation.subscribe()
  }

  fn set_lifecycle(&self, state: Lifecycle) {
    debug!(cache = %self.cache_name, ?state, "asset cache lifecycle");
    self.lifecycle.send_replace(state);
  }

  /// Whether the current bucket already holds the whole manifest
  pub fn is_installed(&self) -> Result<bool> {
    let urls: Vec<String> = self.manifest.iter().map(Url::to_string).collect();
    self.store.contains_all(&self.cache_name, &urls)
  }

  /// Fetch every manifest entry into the current bucket.
  ///
  /// All or nothing: if any entry fails to fetch or answers non-2xx, the
  /// install fails, naming that entry, and the bucket is left untouched.
  pub async fn install(&self) -> Result<usize> {
    self.set_lifecycle(Lifecycle::Installing);

    let fetches = self.manifest.iter().map(|url| async move {
      let asset = self.fetcher.fetch(url).await?;
      if !asset.is_success() {
        return Err(eyre!("Failed to cache {}: HTTP {}", url, asset.status));
      }
      Ok::<_, color_eyre::Report>(asset)
    });

    let assets = match try_join_all(fetches).await {
      Ok(assets) => assets,
      Err(e) => {
        warn!(cache = %self.cache_name, error = %e, "install failed");
        self.set_lifecycle(Lifecycle::Redundant);
        return Err(e);
      }
    };

    if let Err(e) = self.store.put_all(&self.cache_name, &assets) {
      self.set_lifecycle(Lifecycle::Redundant);
      return Err(e);
    }

    info!(cache = %self.cache_name, assets = assets.len(), "asset cache installed");
    self.set_lifecycle(Lifecycle::Installed);
    Ok(assets.len())
  }

  /// Make the current bucket the only one and take over open consumers.
  ///
  /// Returns the names of the deleted buckets.
  pub fn activate(&self) -> Result<Vec<String>> {
    self.set_lifecycle(Lifecycle::Activating);

    let result = self.delete_old_buckets();
    match &result {
      Ok(deleted) => {
        for name in deleted {
          info!(cache = %name, "deleted old asset cache");
        }
        self.generation.send_replace(Some(self.cache_name.clone()));
        self.set_lifecycle(Lifecycle::Activated);
      }
      Err(e) => {
        warn!(cache = %self.cache_name, error = %e, "activation failed");
        self.set_lifecycle(Lifecycle::Redundant);
      }
    }
    result
  }

  fn delete_old_buckets(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in self.store.bucket_names()? {
      if name != self.cache_name {
        self.store.delete_bucket(&name)?;
        deleted.push(name);
      }
    }
    Ok(deleted)
  }

  /// Install then activate; ready only when both steps completed.
  pub async fn register(&self) -> Result<()> {
    self.install().await?;
    self.activate()?;
    Ok(())
  }

  /// Serve a request.
  ///
  /// API requests always go to the network. Everything else is answered
  /// from the current bucket when present, otherwise fetched live without
  /// being stored.
  pub async fn fetch(&self, url: &str) -> Result<Served> {
    let parsed = Url::parse(url).map_err(|e| eyre!("Invalid URL {}: {}", url, e))?;

    if self.bypass.bypasses(url) {
      debug!(url, "bypassing asset cache");
      return self.fetch_live(&parsed).await;
    }

    if let Some(asset) = self.store.get(&self.cache_name, parsed.as_str())? {
      return Ok(Served {
        asset,
        from: ServedFrom::Cache,
      });
    }

    self.fetch_live(&parsed).await
  }

  async fn fetch_live(&self, url: &Url) -> Result<Served> {
    let asset = self.fetcher.fetch(url).await?;
    Ok(Served {
      asset,
      from: ServedFrom::Network,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::Mutex;

  /// Serves canned responses and records every URL it was asked for
  #[derive(Default)]
  struct FakeFetcher {
    responses: HashMap<String, u16>,
    requested: Mutex<Vec<String>>,
  }

  impl FakeFetcher {
    fn serving(urls: &[(&str, u16)]) -> Self {
      Self {
        responses: urls.iter().map(|(u, s)| (u.to_string(), *s)).collect(),
        requested: Mutex::new(Vec::new()),
      }
    }
  }

  #[async_trait]
  impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<Asset> {
      self.requested.lock().unwrap().push(url.to_string());
      match self.responses.get(url.as_str()) {
        Some(status) => Ok(Asset {
          url: url.to_string(),
          status: *status,
          content_type: Some("text/plain".to_string()),
          body: format!("body of {}", url).into_bytes(),
        }),
        None => Err(eyre!("connection refused")),
      }
    }
  }

  const BASE: &str = "https://tracker.example.com/app/";
  const API: &str = "https://my.uscis.gov:443/account/case-service/api/cases";

  fn manifest() -> Vec<Url> {
    resolve_manifest(
      BASE,
      &["./".to_string(), "./index.html".to_string(), "./app.js".to_string()],
    )
    .unwrap()
  }

  fn all_ok() -> Vec<(&'static str, u16)> {
    vec![
      ("https://tracker.example.com/app/", 200),
      ("https://tracker.example.com/app/index.html", 200),
      ("https://tracker.example.com/app/app.js", 200),
    ]
  }

  fn cache(db: &Arc<Database>, name: &str, fetcher: FakeFetcher) -> AssetCache<FakeFetcher> {
    AssetCache::new(
      AssetStore::new(Arc::clone(db)),
      fetcher,
      name,
      manifest(),
      BypassRules::new(API),
    )
  }

  #[test]
  fn test_resolve_manifest() {
    let urls = resolve_manifest("https://tracker.example.com/app", &["./icon-192.png".to_string()])
      .unwrap();
    assert_eq!(urls[0].as_str(), "https://tracker.example.com/app/icon-192.png");
    assert_eq!(manifest()[0].as_str(), BASE);
  }

  #[test]
  fn test_bypass_rules() {
    let rules = BypassRules::new(API);
    assert!(rules.bypasses("https://my.uscis.gov/account/whatever"));
    assert!(rules.bypasses("https://tracker.example.com/api/cases/IOE0934989946"));
    assert!(rules.bypasses("https://tracker.example.com/.netlify/functions/proxy"));
    assert!(!rules.bypasses("https://tracker.example.com/app/index.html"));
  }

  #[tokio::test]
  async fn test_install_then_serve_from_cache() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cache = cache(&db, "uscis-tracker-v3", FakeFetcher::serving(&all_ok()));
    assert!(!cache.is_installed().unwrap());

    cache.register().await.unwrap();
    assert_eq!(cache.lifecycle(), Lifecycle::Activated);
    assert!(cache.is_installed().unwrap());

    let served = cache
      .fetch("https://tracker.example.com/app/index.html")
      .await
      .unwrap();
    assert_eq!(served.from, ServedFrom::Cache);
    assert_eq!(cache.fetcher.requested.lock().unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut responses = all_ok();
    responses[2].1 = 404;
    let cache = cache(&db, "uscis-tracker-v3", FakeFetcher::serving(&responses));

    let err = cache.install().await.unwrap_err();
    assert!(err.to_string().contains("app.js"));
    assert_eq!(cache.lifecycle(), Lifecycle::Redundant);
    assert!(AssetStore::new(db).bucket_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_register_stops_on_install_failure() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let old = cache(&db, "uscis-tracker-v2", FakeFetcher::serving(&all_ok()));
    old.register().await.unwrap();

    let broken = cache(&db, "uscis-tracker-v3", FakeFetcher::default());
    assert!(broken.register().await.is_err());
    // the old generation survives a failed upgrade
    assert_eq!(
      AssetStore::new(db).bucket_names().unwrap(),
      vec!["uscis-tracker-v2"]
    );
    assert_eq!(*broken.subscribe().borrow(), None);
  }

  #[tokio::test]
  async fn test_activate_keeps_single_generation() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    cache(&db, "uscis-tracker-v1", FakeFetcher::serving(&all_ok()))
      .register()
      .await
      .unwrap();
    cache(&db, "uscis-tracker-v2", FakeFetcher::serving(&all_ok()))
      .install()
      .await
      .unwrap();

    let current = cache(&db, "uscis-tracker-v3", FakeFetcher::serving(&all_ok()));
    let mut consumer = current.subscribe();
    current.install().await.unwrap();
    let deleted = current.activate().unwrap();

    assert_eq!(deleted, vec!["uscis-tracker-v1", "uscis-tracker-v2"]);
    assert_eq!(
      AssetStore::new(db).bucket_names().unwrap(),
      vec!["uscis-tracker-v3"]
    );
    assert!(consumer.has_changed().unwrap());
    assert_eq!(
      consumer.borrow_and_update().as_deref(),
      Some("uscis-tracker-v3")
    );
  }

  #[tokio::test]
  async fn test_api_requests_bypass_cache() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let api_url = "https://tracker.example.com/api/cases/IOE0934989946";
    let mut responses = all_ok();
    responses.push((api_url, 200));
    let fetcher = FakeFetcher::serving(&responses);

    let cache = cache(&db, "uscis-tracker-v3", fetcher);
    // Even a stored copy of an API response is never served
    cache
      .store
      .put_all(
        "uscis-tracker-v3",
        &[Asset {
          url: api_url.to_string(),
          status: 200,
          content_type: None,
          body: b"stale".to_vec(),
        }],
      )
      .unwrap();

    let served = cache.fetch(api_url).await.unwrap();
    assert_eq!(served.from, ServedFrom::Network);
    assert_ne!(served.asset.body, b"stale".to_vec());
  }

  #[tokio::test]
  async fn test_cache_miss_is_fetched_but_not_stored() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let extra = "https://tracker.example.com/app/styles.css";
    let mut responses = all_ok();
    responses.push((extra, 200));
    let cache = cache(&db, "uscis-tracker-v3", FakeFetcher::serving(&responses));
    cache.register().await.unwrap();

    assert_eq!(cache.fetch(extra).await.unwrap().from, ServedFrom::Network);
    assert_eq!(cache.fetch(extra).await.unwrap().from, ServedFrom::Network);
  }

  #[tokio::test]
  async fn test_offline_miss_is_an_error() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let cache = cache(&db, "uscis-tracker-v3", FakeFetcher::default());
    assert!(cache
      .fetch("https://tracker.example.com/app/index.html")
      .await
      .is_err());
  }
}
