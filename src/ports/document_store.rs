//! Document Store Port - Remote Per-User Collections
//!
//! Defines the trait for the multi-tenant document database that holds
//! each user's records under `users/{userId}/{collection}`. Documents
//! are schemaless JSON maps; the store assigns ids and server
//! timestamps and evaluates access rules per namespace.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::records::SortOrder;

/// Schemaless document body.
pub type Document = Map<String, Value>;

/// Slash-separated collection path, e.g. `users/u1/transactions`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
  /// Collection `collection` inside the namespace of `user_id`.
  pub fn for_user(user_id: &str, collection: &str) -> Self {
    Self(format!("users/{user_id}/{collection}"))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Everything before the last segment (`users/u1`).
  pub fn parent(&self) -> &str {
    self.0.rsplit_once('/').map_or("", |(parent, _)| parent)
  }

  /// Last segment (`transactions`).
  pub fn collection_id(&self) -> &str {
    self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
  }

  /// Full path of the document `id` inside this collection.
  pub fn document(&self, id: &str) -> String {
    format!("{}/{id}", self.0)
  }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// A document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
  /// Store-assigned document id.
  pub id: String,
  /// Document fields, server timestamps resolved.
  pub fields: Document,
}

/// Fields to write plus the fields the server must stamp with its clock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
  pub fields: Document,
  /// Keys set to the server's request time on commit.
  pub server_timestamps: Vec<&'static str>,
}

impl DocumentWrite {
  pub fn new(fields: Document) -> Self {
    Self {
      fields,
      server_timestamps: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_server_timestamp(mut self, field: &'static str) -> Self {
    self.server_timestamps.push(field);
    self
  }
}

/// Errors reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
  /// Access rules reject the caller for this path.
  #[error("permission denied for {path}")]
  PermissionDenied { path: String },
  /// Update target does not exist.
  #[error("document not found: {path}")]
  NotFound { path: String },
  /// Network failure or exhausted retries.
  #[error("transport error: {0}")]
  Transport(String),
  /// The store answered with something we could not decode.
  #[error("malformed response: {0}")]
  Malformed(String),
  /// Any other rejection, e.g. a malformed request.
  #[error("request rejected ({status}): {message}")]
  Rejected { status: u16, message: String },
}

impl RemoteError {
  pub const fn is_permission_denied(&self) -> bool {
    matches!(self, Self::PermissionDenied { .. })
  }
}

/// One delivery from a live query: the full ordered result set, or the
/// error that ended the subscription.
pub type Snapshot = Result<Vec<StoredDocument>, RemoteError>;

/// Receiving end of a live query.
///
/// The first snapshot is available as soon as `listen` returns. Dropping
/// the listener releases the subscription on the store side.
#[derive(Debug)]
pub struct SnapshotListener {
  rx: mpsc::UnboundedReceiver<Snapshot>,
}

impl SnapshotListener {
  pub const fn new(rx: mpsc::UnboundedReceiver<Snapshot>) -> Self {
    Self { rx }
  }

  /// Next snapshot, or `None` once the store closed the subscription.
  pub async fn next(&mut self) -> Option<Snapshot> {
    self.rx.recv().await
  }
}

/// Trait for remote document store providers.
///
/// Implementors are multi-tenant: every call carries the full
/// collection path and access is decided per path. A permission failure
/// MUST be reported as `RemoteError::PermissionDenied` so callers can
/// tell it apart from transport trouble.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
  /// Create a document under a store-assigned id and return that id.
  async fn add_document(
    &self,
    path: &CollectionPath,
    write: DocumentWrite,
  ) -> Result<String, RemoteError>;

  /// Read the whole collection, optionally ordered by one field.
  async fn query(
    &self,
    path: &CollectionPath,
    order: Option<SortOrder>,
  ) -> Result<Vec<StoredDocument>, RemoteError>;

  /// Subscribe to the ordered query; every change re-delivers the full
  /// result set.
  async fn listen(
    &self,
    path: &CollectionPath,
    order: Option<SortOrder>,
  ) -> Result<SnapshotListener, RemoteError>;

  /// Merge `write` into an existing document.
  async fn update_document(
    &self,
    path: &CollectionPath,
    id: &str,
    write: DocumentWrite,
  ) -> Result<(), RemoteError>;

  /// Delete a document. Deleting a missing document is not an error.
  async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), RemoteError>;
}
