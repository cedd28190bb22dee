//! In-Process Document Store
//!
//! A multi-tenant document store held in memory. It follows the remote
//! store's contract closely enough to stand in for it in tests and
//! offline runs: store-assigned auto-ids, server timestamps, per-path
//! access rules, ordered queries, and live listeners that are re-fed the
//! full ordered result set after every write.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::domain::ids::new_auto_id;
use crate::domain::records::{Direction, SortOrder};
use crate::ports::document_store::{
    CollectionPath, DocumentStore, DocumentWrite, RemoteError, Snapshot,
    SnapshotListener, StoredDocument,
};

/// A registered live query.
struct Listener {
    path: String,
    order: Option<SortOrder>,
    tx: mpsc::UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Inner {
    /// Documents per collection path, in insertion order.
    collections: HashMap<String, Vec<StoredDocument>>,
    /// Path prefixes whose access rules deny every operation.
    denied_prefixes: Vec<String>,
    /// Path prefixes that fail with an injected error.
    faults: Vec<(String, RemoteError)>,
    listeners: Vec<Listener>,
    /// Successful writes, across all paths.
    writes: usize,
}

impl Inner {
    fn check_access(&self, path: &str) -> Result<(), RemoteError> {
        if let Some((_, err)) = self.faults.iter().find(|(p, _)| is_under(path, p)) {
            return Err(err.clone());
        }
        if self.denied_prefixes.iter().any(|p| is_under(path, p)) {
            return Err(RemoteError::PermissionDenied {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn snapshot(&self, path: &str, order: Option<SortOrder>) -> Vec<StoredDocument> {
        let docs = self.collections.get(path).cloned().unwrap_or_default();
        sort_documents(docs, order)
    }

    /// Push the current result set to every listener on `path`, dropping
    /// listeners whose receiver is gone.
    fn notify(&mut self, path: &str) {
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.retain(|l| {
            if l.path != path {
                return !l.tx.is_closed();
            }
            l.tx.send(Ok(self.snapshot(path, l.order))).is_ok()
        });
        self.listeners = listeners;
    }

    /// End every listener under a newly denied prefix, as a real store
    /// does when rules change under an open subscription.
    fn revoke_listeners(&mut self, prefix: &str) {
        self.listeners.retain(|l| {
            if is_under(&l.path, prefix) {
                let _ = l.tx.send(Err(RemoteError::PermissionDenied {
                    path: l.path.clone(),
                }));
                return false;
            }
            true
        });
    }
}

/// Whether `path` is `prefix` itself or lies below it, segment-wise:
/// `users/ana` covers `users/ana/accounts` but not `users/anabel`.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// In-memory `DocumentStore` with configurable access rules.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every operation on `prefix` and the paths below it
    /// (e.g. `users/u1` or just `users`). Open listeners under the
    /// prefix receive a permission error and are closed.
    pub fn deny_prefix(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        let mut inner = self.lock();
        inner.revoke_listeners(&prefix);
        inner.denied_prefixes.push(prefix);
    }

    /// Lift a previous `deny_prefix`.
    pub fn allow_prefix(&self, prefix: &str) {
        self.lock().denied_prefixes.retain(|p| p != prefix);
    }

    /// Fail every operation under `prefix` with `error`.
    pub fn inject_fault(&self, prefix: impl Into<String>, error: RemoteError) {
        self.lock().faults.push((prefix.into(), error));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Documents currently stored at `path`, in insertion order.
    pub fn documents(&self, path: &CollectionPath) -> Vec<StoredDocument> {
        self.lock()
            .collections
            .get(path.as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Number of live listeners still registered.
    pub fn listener_count(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|l| !l.tx.is_closed());
        inner.listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test thread panicked mid-write;
        // the data is still usable.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn server_now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn apply_write(target: &mut serde_json::Map<String, Value>, write: DocumentWrite) {
    target.extend(write.fields);
    for field in write.server_timestamps {
        target.insert(field.to_string(), server_now());
    }
}

/// Order documents the way the remote store does: documents missing the
/// order field are excluded, ties keep insertion order.
fn sort_documents(mut docs: Vec<StoredDocument>, order: Option<SortOrder>) -> Vec<StoredDocument> {
    let Some(order) = order else {
        return docs;
    };
    docs.retain(|d| d.fields.get(order.field).is_some_and(|v| !v.is_null()));
    docs.sort_by(|a, b| {
        let ord = compare_values(&a.fields[order.field], &b.fields[order.field]);
        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
    docs
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // Mixed types: numbers before strings, everything else equal.
        (Value::Number(_), Value::String(_)) => Ordering::Less,
        (Value::String(_), Value::Number(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    #[instrument(skip_all, fields(path = %path))]
    async fn add_document(
        &self,
        path: &CollectionPath,
        write: DocumentWrite,
    ) -> Result<String, RemoteError> {
        let mut inner = self.lock();
        inner.check_access(path.as_str())?;

        let id = new_auto_id();
        let mut fields = serde_json::Map::new();
        apply_write(&mut fields, write);
        inner
            .collections
            .entry(path.as_str().to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                fields,
            });
        inner.writes += 1;
        inner.notify(path.as_str());

        debug!(id = %id, "Document added");
        Ok(id)
    }

    async fn query(
        &self,
        path: &CollectionPath,
        order: Option<SortOrder>,
    ) -> Result<Vec<StoredDocument>, RemoteError> {
        let inner = self.lock();
        inner.check_access(path.as_str())?;
        Ok(inner.snapshot(path.as_str(), order))
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn listen(
        &self,
        path: &CollectionPath,
        order: Option<SortOrder>,
    ) -> Result<SnapshotListener, RemoteError> {
        let mut inner = self.lock();
        inner.check_access(path.as_str())?;

        let (tx, rx) = mpsc::unbounded_channel();
        // Initial snapshot is delivered before listen returns.
        let _ = tx.send(Ok(inner.snapshot(path.as_str(), order)));
        inner.listeners.push(Listener {
            path: path.as_str().to_string(),
            order,
            tx,
        });
        Ok(SnapshotListener::new(rx))
    }

    async fn update_document(
        &self,
        path: &CollectionPath,
        id: &str,
        write: DocumentWrite,
    ) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.check_access(path.as_str())?;

        let doc = inner
            .collections
            .get_mut(path.as_str())
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| RemoteError::NotFound {
                path: path.document(id),
            })?;
        apply_write(&mut doc.fields, write);
        inner.writes += 1;
        inner.notify(path.as_str());
        Ok(())
    }

    async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), RemoteError> {
        let mut inner = self.lock();
        inner.check_access(path.as_str())?;

        if let Some(docs) = inner.collections.get_mut(path.as_str()) {
            docs.retain(|d| d.id != id);
        }
        inner.writes += 1;
        inner.notify(path.as_str());
        Ok(())
    }
}
