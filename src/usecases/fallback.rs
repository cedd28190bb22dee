//! Fallback Collections - Per-Kind Arrays in the Local Store
//!
//! Each entity kind lives under its collection name as one JSON array.
//! The key-value port has no partial update, so every mutation reads
//! the whole array, changes it in memory, and writes it back. Mutations
//! are serialized by an async mutex so concurrent writers from the same
//! process never lose each other's records.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::errors::StoreError;
use crate::domain::ids::new_local_id;
use crate::domain::records::{Entity, EntityKind, Record, RecordId};
use crate::ports::document_store::Document;
use crate::ports::key_value::{KeyValueStore, LocalStoreError};

/// Typed view over the local fallback store.
pub struct FallbackCollections<L: KeyValueStore> {
  store: Arc<L>,
  /// Held across every read-modify-write.
  write_lock: Mutex<()>,
}

impl<L: KeyValueStore> FallbackCollections<L> {
  pub fn new(store: Arc<L>) -> Self {
    Self {
      store,
      write_lock: Mutex::new(()),
    }
  }

  pub const fn store(&self) -> &Arc<L> {
    &self.store
  }

  /// Every record of `T`'s kind, in insertion order.
  pub async fn read<T: Entity>(&self) -> Result<Vec<Record<T>>, LocalStoreError> {
    let key = T::KIND.collection();
    self
      .read_raw(T::KIND)
      .await?
      .into_iter()
      .map(|item| {
        serde_json::from_value(item).map_err(|source| LocalStoreError::Corrupt {
          key: key.to_string(),
          source,
        })
      })
      .collect()
  }

  /// Store `draft` under a fresh local id stamped with the client clock.
  #[instrument(skip_all, fields(kind = %T::KIND))]
  pub async fn append<T: Entity>(&self, draft: T) -> Result<RecordId, StoreError> {
    let record = Record {
      id: new_local_id(),
      created_at: Some(Utc::now()),
      updated_at: None,
      data: draft,
    };
    let value = serde_json::to_value(&record)?;

    let _guard = self.write_lock.lock().await;
    let mut items = self.read_raw(T::KIND).await?;
    items.push(value);
    self.write_raw(T::KIND, &items).await?;

    debug!(id = %record.id, total = items.len(), "Record appended locally");
    Ok(record.id)
  }

  /// Merge `fields` into record `id` and stamp `updatedAt`.
  pub async fn merge(
    &self,
    kind: EntityKind,
    id: &str,
    fields: Document,
  ) -> Result<(), StoreError> {
    let _guard = self.write_lock.lock().await;
    let mut items = self.read_raw(kind).await?;

    let Some(target) = items
      .iter_mut()
      .filter_map(Value::as_object_mut)
      .find(|item| item.get("id").and_then(Value::as_str) == Some(id))
    else {
      return Err(not_found(kind, id));
    };
    target.extend(fields);
    target.insert(
      "updatedAt".to_string(),
      Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    self.write_raw(kind, &items).await?;
    Ok(())
  }

  /// Drop record `id` from its collection.
  pub async fn remove(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
    let _guard = self.write_lock.lock().await;
    let mut items = self.read_raw(kind).await?;

    let before = items.len();
    items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
    if items.len() == before {
      return Err(not_found(kind, id));
    }

    self.write_raw(kind, &items).await?;
    Ok(())
  }

  async fn read_raw(&self, kind: EntityKind) -> Result<Vec<Value>, LocalStoreError> {
    let key = kind.collection();
    match self.store.get(key).await? {
      None => Ok(Vec::new()),
      Some(text) if text.trim().is_empty() => Ok(Vec::new()),
      Some(text) => serde_json::from_str(&text).map_err(|source| LocalStoreError::Corrupt {
        key: key.to_string(),
        source,
      }),
    }
  }

  async fn write_raw(&self, kind: EntityKind, items: &[Value]) -> Result<(), LocalStoreError> {
    let key = kind.collection();
    let text = serde_json::to_string(items).map_err(|source| LocalStoreError::Corrupt {
      key: key.to_string(),
      source,
    })?;
    self.store.set(key, &text).await
  }
}

fn not_found(kind: EntityKind, id: &str) -> StoreError {
  StoreError::NotFound {
    kind,
    id: id.to_string(),
  }
}
