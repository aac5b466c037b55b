use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub queue: QueueConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Base URL of the hosted row API (one endpoint per table).
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Default time-to-live for cache entries, in milliseconds.
  #[serde(default = "default_ttl_ms")]
  pub default_ttl_ms: i64,
  /// How often the background sweep evicts expired entries, in seconds.
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      default_ttl_ms: default_ttl_ms(),
      sweep_interval_secs: default_sweep_interval_secs(),
    }
  }
}

fn default_ttl_ms() -> i64 {
  300_000
}

fn default_sweep_interval_secs() -> u64 {
  60
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
  /// Retry budget for each queued offline operation.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Path to the durable queue database. When unset the queue is
  /// memory-only and pending writes do not survive a restart.
  pub persist_path: Option<PathBuf>,
  #[serde(default)]
  pub retry: RetryConfig,
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      max_retries: default_max_retries(),
      persist_path: None,
      retry: RetryConfig::default(),
    }
  }
}

fn default_max_retries() -> u32 {
  3
}

/// Retry scheduling between drain passes.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
  /// Exponential backoff with jitter between attempts.
  #[default]
  Backoff,
  /// Retry on every drain pass with no delay. Matches the behavior of the
  /// original client for migration validation.
  Legacy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  #[serde(default)]
  pub mode: RetryMode,
  /// Base delay for the first backoff step, in milliseconds.
  #[serde(default = "default_backoff_base_ms")]
  pub base_ms: i64,
  /// Upper bound on the backoff delay, in milliseconds.
  #[serde(default = "default_backoff_cap_ms")]
  pub cap_ms: i64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      mode: RetryMode::default(),
      base_ms: default_backoff_base_ms(),
      cap_ms: default_backoff_cap_ms(),
    }
  }
}

fn default_backoff_base_ms() -> i64 {
  1_000
}

fn default_backoff_cap_ms() -> i64 {
  60_000
}

impl QueueConfig {
  pub fn retry_policy(&self) -> RetryPolicy {
    match self.retry.mode {
      RetryMode::Legacy => RetryPolicy::Legacy,
      RetryMode::Backoff => RetryPolicy::Backoff {
        base_ms: self.retry.base_ms,
        cap_ms: self.retry.cap_ms,
      },
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./staysync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/staysync/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/staysync/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("staysync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("staysync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Get the backend API key from environment variables.
  ///
  /// Checks STAYSYNC_API_KEY first, then STAYSYNC_SERVICE_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("STAYSYNC_API_KEY")
      .or_else(|_| std::env::var("STAYSYNC_SERVICE_KEY"))
      .map_err(|_| {
        eyre!("Backend API key not found. Set STAYSYNC_API_KEY or STAYSYNC_SERVICE_KEY environment variable.")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_fill_missing_sections() {
    let config: Config =
      serde_yaml::from_str("backend:\n  url: https://api.example.com/rest/v1/\n").unwrap();
    assert_eq!(config.cache.default_ttl_ms, 300_000);
    assert_eq!(config.cache.sweep_interval_secs, 60);
    assert_eq!(config.queue.max_retries, 3);
    assert!(config.queue.persist_path.is_none());
    assert_eq!(config.queue.retry.mode, RetryMode::Backoff);
  }

  #[test]
  fn test_legacy_retry_mode() {
    let yaml = r#"
backend:
  url: https://api.example.com/rest/v1/
queue:
  max_retries: 2
  retry:
    mode: legacy
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.queue.max_retries, 2);
    assert_eq!(config.queue.retry_policy(), RetryPolicy::Legacy);
  }
}
