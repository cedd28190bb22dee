//! Finance Store - Persistence Facade with Local Fallback
//!
//! Entry point for every read and write of user records. Each call is
//! routed to the remote document store under `users/{userId}/{kind}`;
//! when the store answers with a permission denial the same call is
//! served by the local fallback collections instead. Callers learn
//! which path served them only through `Route`, never through an error.
//!
//! Ordering of checks on every write:
//! 1. Validate the draft (no I/O)
//! 2. Resolve the session namespace (`AuthRequired` otherwise)
//! 3. Try the remote store, fall back on permission denial only

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::errors::StoreError;
use super::fallback::FallbackCollections;
use crate::adapters::metrics::StoreMetrics;
use crate::domain::records::{
  Account, Category, Entity, EntityKind, Record, RecordId, Subscription, Transaction,
};
use crate::domain::validation::{ValidationError, require_text};
use crate::ports::document_store::{
  CollectionPath, Document, DocumentStore, DocumentWrite, RemoteError, SnapshotListener,
  StoredDocument,
};
use crate::ports::key_value::KeyValueStore;
use crate::ports::session::Session;

/// Collection read by `probe`; it never holds records.
const PROBE_COLLECTION: &str = "test";

/// Which store served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
  Remote,
  Fallback,
}

impl Route {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Remote => "remote",
      Self::Fallback => "fallback",
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stored {
  pub via: Route,
  /// Id assigned by the store that took the write.
  pub id: RecordId,
}

/// A value together with the route that produced it.
#[derive(Debug)]
struct Routed<T> {
  via: Route,
  value: T,
}

/// Reachability of the signed-in user's remote namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ConnectionStatus {
  /// No user in the session.
  SignedOut,
  Connected,
  /// Access rules reject the namespace; writes will use the fallback.
  Denied,
  Unreachable(String),
}

/// Live subscription returned by `FinanceStore::watch`.
///
/// Dropping the handle also ends the subscription.
#[derive(Debug)]
pub struct WatchHandle {
  cancel: Option<oneshot::Sender<()>>,
  task: Option<JoinHandle<()>>,
}

impl WatchHandle {
  /// Handle for a subscription that will never deliver again.
  const fn noop() -> Self {
    Self {
      cancel: None,
      task: None,
    }
  }

  /// Whether remote snapshots can still arrive.
  pub fn is_live(&self) -> bool {
    self.task.as_ref().is_some_and(|task| !task.is_finished())
  }

  /// Release the subscription and wait for its task to stop.
  pub async fn unsubscribe(mut self) {
    self.signal_cancel();
    if let Some(task) = self.task.take() {
      let _ = task.await;
    }
  }

  fn signal_cancel(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      let _ = cancel.send(());
    }
  }
}

impl Drop for WatchHandle {
  fn drop(&mut self) {
    self.signal_cancel();
  }
}

/// Persistence facade over a remote document store and a local fallback.
pub struct FinanceStore<R: DocumentStore, L: KeyValueStore> {
  remote: Arc<R>,
  local: Arc<FallbackCollections<L>>,
  metrics: Option<Arc<StoreMetrics>>,
}

impl<R: DocumentStore, L: KeyValueStore> FinanceStore<R, L> {
  pub fn new(remote: Arc<R>, local: Arc<L>) -> Self {
    Self {
      remote,
      local: Arc::new(FallbackCollections::new(local)),
      metrics: None,
    }
  }

  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<StoreMetrics>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub const fn remote(&self) -> &Arc<R> {
    &self.remote
  }

  pub fn local(&self) -> &Arc<L> {
    self.local.store()
  }

  // ── Writes ───────────────────────────────────────────────

  /// Validate and persist a new record of any kind.
  #[instrument(skip_all, fields(kind = %T::KIND, user_id = session.user_id()))]
  pub async fn add<T: Entity>(&self, session: &Session, draft: T) -> Result<Stored, StoreError> {
    self.check(T::KIND, draft.validate())?;
    let path = namespace(session, T::KIND)?;

    let write = DocumentWrite::new(to_document(&draft)?).with_server_timestamp("createdAt");
    let routed = self
      .route(
        T::KIND,
        "add",
        self.remote.add_document(&path, write),
        || self.local.append(draft),
      )
      .await?;

    if let Some(metrics) = &self.metrics {
      metrics
        .writes
        .with_label_values(&[T::KIND.collection(), routed.via.as_str()])
        .inc();
    }
    info!(id = %routed.value, route = %routed.via, "Record stored");
    Ok(Stored {
      via: routed.via,
      id: routed.value,
    })
  }

  pub async fn add_transaction(
    &self,
    session: &Session,
    draft: Transaction,
  ) -> Result<Stored, StoreError> {
    self.add(session, draft).await
  }

  pub async fn add_account(&self, session: &Session, draft: Account) -> Result<Stored, StoreError> {
    self.add(session, draft).await
  }

  pub async fn add_subscription(
    &self,
    session: &Session,
    draft: Subscription,
  ) -> Result<Stored, StoreError> {
    self.add(session, draft).await
  }

  pub async fn add_category(&self, session: &Session, draft: Category) -> Result<Stored, StoreError> {
    self.add(session, draft).await
  }

  /// Replace the fields of category `id` and stamp `updatedAt`.
  #[instrument(skip(self, session, draft), fields(user_id = session.user_id()))]
  pub async fn update_category(
    &self,
    session: &Session,
    id: &str,
    draft: Category,
  ) -> Result<Stored, StoreError> {
    let kind = EntityKind::Categories;
    self.check(kind, require_text("id", id))?;
    self.check(kind, draft.validate())?;
    let path = namespace(session, kind)?;

    let fields = to_document(&draft)?;
    let write = DocumentWrite::new(fields.clone()).with_server_timestamp("updatedAt");
    let routed = self
      .route(
        kind,
        "update",
        self.remote.update_document(&path, id, write),
        || self.local.merge(kind, id, fields),
      )
      .await
      .map_err(|e| remote_not_found(e, kind, id))?;

    info!(route = %routed.via, "Category updated");
    Ok(Stored {
      via: routed.via,
      id: id.to_string(),
    })
  }

  /// Delete category `id`.
  #[instrument(skip(self, session), fields(user_id = session.user_id()))]
  pub async fn delete_category(&self, session: &Session, id: &str) -> Result<Stored, StoreError> {
    let kind = EntityKind::Categories;
    self.check(kind, require_text("id", id))?;
    let path = namespace(session, kind)?;

    let routed = self
      .route(
        kind,
        "delete",
        self.remote.delete_document(&path, id),
        || self.local.remove(kind, id),
      )
      .await
      .map_err(|e| remote_not_found(e, kind, id))?;

    info!(route = %routed.via, "Category deleted");
    Ok(Stored {
      via: routed.via,
      id: id.to_string(),
    })
  }

  // ── Reads ────────────────────────────────────────────────

  /// All records of kind `T`, in the kind's query order.
  ///
  /// When served by the fallback the records come back in insertion
  /// order instead.
  #[instrument(skip_all, fields(kind = %T::KIND, user_id = session.user_id()))]
  pub async fn list<T: Entity>(&self, session: &Session) -> Result<Vec<Record<T>>, StoreError> {
    let path = namespace(session, T::KIND)?;

    let routed = self
      .route(
        T::KIND,
        "list",
        async {
          self
            .remote
            .query(&path, T::KIND.sort_order())
            .await
            .and_then(decode_documents::<T>)
        },
        || async { self.local.read::<T>().await.map_err(StoreError::from) },
      )
      .await?;

    debug!(count = routed.value.len(), route = %routed.via, "Records listed");
    Ok(routed.value)
  }

  /// Subscribe to the ordered collection of kind `T`.
  ///
  /// `on_change` receives the full current list on every change. When
  /// the remote store denies the subscription it receives the fallback
  /// collection once and the returned handle is inert.
  #[instrument(skip_all, fields(kind = %T::KIND, user_id = session.user_id()))]
  pub async fn watch<T, F>(&self, session: &Session, mut on_change: F) -> Result<WatchHandle, StoreError>
  where
    T: Entity,
    F: FnMut(Vec<Record<T>>) + Send + 'static,
  {
    let path = namespace(session, T::KIND)?;

    let listener = match self.remote.listen(&path, T::KIND.sort_order()).await {
      Ok(listener) => listener,
      Err(e) if e.is_permission_denied() => {
        warn!(error = %e, "Watch denied, delivering fallback collection once");
        self.count_fallback(T::KIND, "watch");
        on_change(self.local.read::<T>().await?);
        return Ok(WatchHandle::noop());
      }
      Err(e) => {
        self.count_remote_error(T::KIND, "watch");
        return Err(e.into());
      }
    };

    let (cancel_tx, cancel_rx) = oneshot::channel();
    let task = tokio::spawn(drive_listener(
      listener,
      Arc::clone(&self.local),
      cancel_rx,
      on_change,
    ));

    info!(path = %path, "Watch started");
    Ok(WatchHandle {
      cancel: Some(cancel_tx),
      task: Some(task),
    })
  }

  /// Check whether the session's remote namespace is readable.
  #[instrument(skip_all, fields(user_id = session.user_id()))]
  pub async fn probe(&self, session: &Session) -> ConnectionStatus {
    let Some(user_id) = session.user_id() else {
      return ConnectionStatus::SignedOut;
    };
    let path = CollectionPath::for_user(user_id, PROBE_COLLECTION);
    match self.remote.query(&path, None).await {
      Ok(_) => ConnectionStatus::Connected,
      Err(e) if e.is_permission_denied() => ConnectionStatus::Denied,
      Err(e) => {
        warn!(error = %e, "Remote store unreachable");
        ConnectionStatus::Unreachable(e.to_string())
      }
    }
  }

  // ── Routing ──────────────────────────────────────────────

  /// Run `remote`; on a permission denial run `fallback` instead.
  ///
  /// Exactly one of the two paths produces the result. Any other remote
  /// error is returned unchanged.
  async fn route<T, FB, FBFut>(
    &self,
    kind: EntityKind,
    op: &'static str,
    remote: impl Future<Output = Result<T, RemoteError>>,
    fallback: FB,
  ) -> Result<Routed<T>, StoreError>
  where
    FB: FnOnce() -> FBFut,
    FBFut: Future<Output = Result<T, StoreError>>,
  {
    match remote.await {
      Ok(value) => Ok(Routed {
        via: Route::Remote,
        value,
      }),
      Err(e) if e.is_permission_denied() => {
        warn!(%kind, op, error = %e, "Remote store denied access, using local fallback");
        self.count_fallback(kind, op);
        let value = fallback().await?;
        Ok(Routed {
          via: Route::Fallback,
          value,
        })
      }
      Err(e) => {
        self.count_remote_error(kind, op);
        Err(e.into())
      }
    }
  }

  fn check(&self, kind: EntityKind, result: Result<(), ValidationError>) -> Result<(), StoreError> {
    result.map_err(|err| {
      debug!(%kind, field = err.field, reason = %err.reason, "Draft rejected");
      if let Some(metrics) = &self.metrics {
        metrics
          .validation_failures
          .with_label_values(&[kind.collection(), err.field])
          .inc();
      }
      StoreError::Validation(err)
    })
  }

  fn count_fallback(&self, kind: EntityKind, op: &str) {
    if let Some(metrics) = &self.metrics {
      metrics.fallbacks.with_label_values(&[kind.collection(), op]).inc();
    }
  }

  fn count_remote_error(&self, kind: EntityKind, op: &str) {
    if let Some(metrics) = &self.metrics {
      metrics
        .remote_errors
        .with_label_values(&[kind.collection(), op])
        .inc();
    }
  }
}

/// Forward snapshots to `on_change` until cancelled or the stream ends.
///
/// A permission denial mid-stream delivers the fallback collection once;
/// any other failure delivers an empty list. Both end the subscription.
async fn drive_listener<T, L, F>(
  mut listener: SnapshotListener,
  local: Arc<FallbackCollections<L>>,
  mut cancel: oneshot::Receiver<()>,
  mut on_change: F,
) where
  T: Entity,
  L: KeyValueStore,
  F: FnMut(Vec<Record<T>>) + Send + 'static,
{
  loop {
    tokio::select! {
      biased;
      _ = &mut cancel => {
        debug!(kind = %T::KIND, "Watch released");
        break;
      }
      snapshot = listener.next() => match snapshot {
        Some(Ok(docs)) => match decode_documents::<T>(docs) {
          Ok(records) => on_change(records),
          Err(e) => {
            error!(kind = %T::KIND, error = %e, "Undecodable snapshot, ending watch");
            on_change(Vec::new());
            break;
          }
        },
        Some(Err(e)) if e.is_permission_denied() => {
          warn!(kind = %T::KIND, error = %e, "Watch revoked, delivering fallback collection once");
          match local.read::<T>().await {
            Ok(records) => on_change(records),
            Err(e) => {
              error!(kind = %T::KIND, error = %e, "Fallback collection unreadable");
              on_change(Vec::new());
            }
          }
          break;
        }
        Some(Err(e)) => {
          error!(kind = %T::KIND, error = %e, "Watch failed");
          on_change(Vec::new());
          break;
        }
        None => {
          debug!(kind = %T::KIND, "Remote closed the watch");
          break;
        }
      }
    }
  }
}

fn namespace(session: &Session, kind: EntityKind) -> Result<CollectionPath, StoreError> {
  let user_id = session.user_id().ok_or(StoreError::AuthRequired)?;
  Ok(CollectionPath::for_user(user_id, kind.collection()))
}

fn to_document<T: Serialize>(draft: &T) -> Result<Document, StoreError> {
  match serde_json::to_value(draft)? {
    Value::Object(fields) => Ok(fields),
    other => Err(StoreError::Encoding(serde::ser::Error::custom(format!(
      "expected a map, got {other}"
    )))),
  }
}

/// Attach each document's id and decode it as a `Record<T>`.
fn decode_documents<T: Entity>(docs: Vec<StoredDocument>) -> Result<Vec<Record<T>>, RemoteError> {
  docs
    .into_iter()
    .map(|doc| {
      let mut fields = doc.fields;
      fields.insert("id".to_string(), Value::String(doc.id.clone()));
      serde_json::from_value(Value::Object(fields))
        .map_err(|e| RemoteError::Malformed(format!("document {}: {e}", doc.id)))
    })
    .collect()
}

fn remote_not_found(err: StoreError, kind: EntityKind, id: &str) -> StoreError {
  match err {
    StoreError::Remote(RemoteError::NotFound { .. }) => StoreError::NotFound {
      kind,
      id: id.to_string(),
    },
    other => other,
  }
}
