//! Key-Value Port - Local Fallback Storage Interface
//!
//! A per-device string store with whole-value reads and writes, used
//! when the remote store denies access. No partial update primitive:
//! callers read a value, change it in memory, and write it back whole.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the local fallback store.
#[derive(Debug, Error)]
pub enum LocalStoreError {
  #[error("local store I/O failed for `{key}`: {source}")]
  Io {
    key: String,
    #[source]
    source: std::io::Error,
  },
  #[error("local collection `{key}` is not valid JSON: {source}")]
  Corrupt {
    key: String,
    #[source]
    source: serde_json::Error,
  },
  #[error("invalid local store key `{0}`")]
  InvalidKey(String),
}

/// Trait for local key-value storage providers.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
  /// Stored value, or `None` if the key was never written.
  async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

  /// Replace the value stored under `key`.
  async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

  /// Remove `key`; removing a missing key is a no-op.
  async fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
}
