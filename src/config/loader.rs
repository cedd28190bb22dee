//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, RemoteBackend};

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    backend = ?config.remote.backend,
    data_dir = %config.local.data_dir,
    metrics = config.metrics.enabled,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(!config.app.name.trim().is_empty(), "app.name must not be empty");
  anyhow::ensure!(
    matches!(
      config.app.log_level.as_str(),
      "trace" | "debug" | "info" | "warn" | "error"
    ),
    "app.log_level must be one of trace/debug/info/warn/error, got {}",
    config.app.log_level
  );

  // Remote validation
  if config.remote.backend == RemoteBackend::Firestore {
    anyhow::ensure!(
      !config.remote.project_id.trim().is_empty(),
      "remote.project_id is required for the firestore backend"
    );
    anyhow::ensure!(
      config.remote.base_url.starts_with("http://") || config.remote.base_url.starts_with("https://"),
      "remote.base_url must be an http(s) URL, got {}",
      config.remote.base_url
    );
  }
  anyhow::ensure!(
    config.remote.timeout_ms > 0,
    "remote.timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.remote.poll_interval_ms >= 100,
    "remote.poll_interval_ms must be at least 100, got {}",
    config.remote.poll_interval_ms
  );
  anyhow::ensure!(
    config.remote.max_retries <= 10,
    "remote.max_retries must be in [0, 10], got {}",
    config.remote.max_retries
  );

  // Local validation
  anyhow::ensure!(
    !config.local.data_dir.trim().is_empty(),
    "local.data_dir must not be empty"
  );

  Ok(())
}
