use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://my.uscis.gov:443/account/case-service/api/cases";
pub const DEFAULT_CACHE_NAME: &str = "uscis-tracker-v3";
pub const DEFAULT_TIMEZONE: &str = "America/Chicago";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Timezone used until the user picks one (IANA name)
  pub timezone: Option<String>,
  #[serde(default)]
  pub shell: ShellConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_base")]
  pub base_url: String,
  /// Receipt number requested to find out whether the session is still valid
  #[serde(default = "default_probe_receipt")]
  pub auth_probe_receipt: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_api_base(),
      auth_probe_receipt: default_probe_receipt(),
    }
  }
}

/// Offline copy of the web shell
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
  /// Where the shell is hosted; relative manifest paths resolve against it
  pub base_url: Option<String>,
  #[serde(default = "default_cache_name")]
  pub cache_name: String,
  #[serde(default = "default_manifest")]
  pub manifest: Vec<String>,
}

impl Default for ShellConfig {
  fn default() -> Self {
    Self {
      base_url: None,
      cache_name: default_cache_name(),
      manifest: default_manifest(),
    }
  }
}

fn default_api_base() -> String {
  DEFAULT_API_BASE.to_string()
}

fn default_probe_receipt() -> String {
  "IOE0000000000".to_string()
}

fn default_cache_name() -> String {
  DEFAULT_CACHE_NAME.to_string()
}

fn default_manifest() -> Vec<String> {
  [
    "./",
    "./index.html",
    "./app.js",
    "./manifest.json",
    "./icon-192.png",
    "./icon-512.png",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./casewatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/casewatch/config.yaml
  ///
  /// Every field has a default, so running without any file is fine.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("casewatch.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("casewatch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    // An empty document deserializes as unit, not as an empty mapping
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  pub fn default_timezone(&self) -> &str {
    self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
  }

  /// Session cookie carried on every API request.
  ///
  /// Read from CASEWATCH_SESSION_COOKIE; absent means requests go out without
  /// credentials and the API will answer 401/403.
  pub fn session_cookie() -> Option<String> {
    std::env::var("CASEWATCH_SESSION_COOKIE")
      .ok()
      .filter(|c| !c.trim().is_empty())
  }

  /// Directory holding the database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("casewatch"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_config_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.api.base_url, DEFAULT_API_BASE);
    assert_eq!(config.api.auth_probe_receipt, "IOE0000000000");
    assert_eq!(config.shell.cache_name, DEFAULT_CACHE_NAME);
    assert_eq!(config.shell.manifest.len(), 6);
    assert_eq!(config.default_timezone(), "America/Chicago");
  }

  #[test]
  fn test_partial_config() {
    let yaml = r#"
timezone: America/New_York
api:
  base_url: http://localhost:9000/cases
shell:
  base_url: https://tracker.example.com/
  cache_name: uscis-tracker-v4
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.api.base_url, "http://localhost:9000/cases");
    assert_eq!(config.api.auth_probe_receipt, "IOE0000000000");
    assert_eq!(config.default_timezone(), "America/New_York");
    assert_eq!(
      config.shell.base_url.as_deref(),
      Some("https://tracker.example.com/")
    );
    assert_eq!(config.shell.cache_name, "uscis-tracker-v4");
    assert_eq!(config.shell.manifest[1], "./index.html");
  }

  #[test]
  fn test_invalid_yaml_is_an_error() {
    assert!(Config::from_yaml("api: [not, a, map]").is_err());
  }
}
