use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_AGENT_URL: &str = "http://localhost:8001";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Primary data API base
  #[serde(default = "default_api_url")]
  pub api_url: String,
  /// Agent service base (digests, reviews, recipes)
  #[serde(default = "default_agent_url")]
  pub agent_url: String,
  #[serde(default = "default_user_id")]
  pub user_id: i64,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub macro_targets: MacroTargets,
  /// Log file path (defaults to `<data dir>/lifeos/lifeos.log`)
  pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Off: every read goes to the network
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Age after which an entry is refetched even without an invalidation.
  /// Unset: entries only go stale when a write invalidates them.
  pub stale_after_secs: Option<u64>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_after_secs: None,
    }
  }
}

/// Daily goals handed to the macro coach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MacroTargets {
  #[serde(default = "default_protein_g")]
  pub protein_g: i64,
  #[serde(default = "default_calories")]
  pub calories: i64,
}

impl Default for MacroTargets {
  fn default() -> Self {
    Self {
      protein_g: default_protein_g(),
      calories: default_calories(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_agent_url() -> String {
  DEFAULT_AGENT_URL.to_string()
}

fn default_true() -> bool {
  true
}

fn default_user_id() -> i64 {
  1
}

fn default_protein_g() -> i64 {
  150
}

fn default_calories() -> i64 {
  2500
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_url: default_api_url(),
      agent_url: default_agent_url(),
      user_id: default_user_id(),
      title: None,
      cache: CacheConfig::default(),
      macro_targets: MacroTargets::default(),
      log_file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./lifeos.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/lifeos/config.yaml
  ///
  /// With no file anywhere the defaults apply: both services on localhost.
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
    // Check current directory
    let local = PathBuf::from("lifeos.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("lifeos").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid YAML for "no settings"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  /// Apply command line / environment overrides on top of the file.
  pub fn with_overrides(mut self, api_url: Option<String>, agent_url: Option<String>) -> Self {
    if let Some(url) = api_url {
      self.api_url = url;
    }
    if let Some(url) = agent_url {
      self.agent_url = url;
    }
    self
  }

  /// Check that both base URLs parse before anything talks to them.
  pub fn validate(&self) -> Result<()> {
    for (name, value) in [("api_url", &self.api_url), ("agent_url", &self.agent_url)] {
      Url::parse(value).map_err(|e| eyre!("Invalid {} {}: {}", name, value, e))?;
    }
    Ok(())
  }

  pub fn stale_after(&self) -> Option<chrono::Duration> {
    self
      .cache
      .stale_after_secs
      .and_then(|secs| chrono::Duration::try_seconds(secs as i64))
  }

  /// Where logs go when no `log_file` is configured.
  pub fn log_path(&self) -> PathBuf {
    self.log_file.clone().unwrap_or_else(|| {
      dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lifeos")
        .join("lifeos.log")
    })
  }

  /// Header title: the configured one, else the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    Url::parse(&self.api_url)
      .ok()
      .and_then(|u| {
        u.host_str().map(|h| match u.port() {
          Some(port) => format!("{}:{}", h, port),
          None => h.to_string(),
        })
      })
      .unwrap_or_else(|| self.api_url.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_without_file_contents() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api_url, "http://localhost:8000");
    assert_eq!(config.agent_url, "http://localhost:8001");
    assert_eq!(config.user_id, 1);
    assert_eq!(config.macro_targets.protein_g, 150);
    assert_eq!(config.macro_targets.calories, 2500);
    assert!(config.stale_after().is_none());
    assert!(config.cache.enabled);
  }

  #[test]
  fn test_cache_can_be_disabled() {
    let config = Config::parse("cache:\n  enabled: false\n").unwrap();
    assert!(!config.cache.enabled);
    assert!(config.stale_after().is_none());
  }

  #[test]
  fn test_partial_file() {
    let config = Config::parse(
      "api_url: http://10.0.0.5:9000\ncache:\n  stale_after_secs: 30\nmacro_targets:\n  protein_g: 120\n",
    )
    .unwrap();
    assert_eq!(config.api_url, "http://10.0.0.5:9000");
    assert_eq!(config.agent_url, DEFAULT_AGENT_URL);
    assert_eq!(config.macro_targets.protein_g, 120);
    assert_eq!(config.macro_targets.calories, 2500);
    assert_eq!(config.stale_after(), chrono::Duration::try_seconds(30));
  }

  #[test]
  fn test_overrides_win() {
    let config = Config::default().with_overrides(Some("http://api:1".into()), None);
    assert_eq!(config.api_url, "http://api:1");
    assert_eq!(config.agent_url, DEFAULT_AGENT_URL);
  }

  #[test]
  fn test_validate_rejects_bad_url() {
    let config = Config::default().with_overrides(None, Some("not a url".into()));
    assert!(config.validate().is_err());
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    assert!(Config::load(Some(Path::new("/nonexistent/lifeos.yaml"))).is_err());
  }

  #[test]
  fn test_display_title() {
    assert_eq!(Config::default().display_title(), "localhost:8000");
    let titled = Config {
      title: Some("Home".into()),
      ..Config::default()
    };
    assert_eq!(titled.display_title(), "Home");
  }
}
