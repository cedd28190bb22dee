//! Configuration Module - TOML-based Store Configuration
//!
//! Loads and validates configuration from `config.toml`. Secrets (API
//! key, ID token, user id) are NOT read from here: they come from
//! environment variables so the file can be committed.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::remote::FirestoreConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Identity and logging.
  pub app: AppSection,
  /// Remote document store.
  pub remote: RemoteConfig,
  /// Local fallback store.
  #[serde(default)]
  pub local: LocalConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  #[serde(default)]
  pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  #[default]
  Json,
  Pretty,
}

/// Which `DocumentStore` adapter to wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
  /// In-process store; data lives as long as the process.
  #[default]
  Memory,
  Firestore,
}

/// Remote document store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  #[serde(default)]
  pub backend: RemoteBackend,
  /// Google Cloud project id (firestore backend).
  #[serde(default)]
  pub project_id: String,
  /// REST API root.
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Interval between live-listener polls in milliseconds.
  #[serde(default = "default_poll_interval_ms")]
  pub poll_interval_ms: u64,
  /// Maximum retries on transient errors.
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Base delay between retries in milliseconds (exponential backoff).
  #[serde(default = "default_retry_base_delay_ms")]
  pub retry_base_delay_ms: u64,
}

impl RemoteConfig {
  /// Firestore client settings; credentials are supplied by the caller.
  pub fn firestore(&self, api_key: Option<String>, id_token: Option<String>) -> FirestoreConfig {
    FirestoreConfig {
      base_url: self.base_url.clone(),
      project_id: self.project_id.clone(),
      api_key,
      id_token,
      timeout: Duration::from_millis(self.timeout_ms),
      poll_interval: Duration::from_millis(self.poll_interval_ms),
      max_retries: self.max_retries,
      retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
    }
  }
}

/// Local fallback configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
  /// Directory holding one JSON file per entity kind.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for LocalConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

/// Metrics and health configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Count store operations in Prometheus counters.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Bind address of the `serve` health/metrics endpoint.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_base_url() -> String {
  "https://firestore.googleapis.com/v1".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_poll_interval_ms() -> u64 {
  2_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_base_delay_ms() -> u64 {
  200
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
