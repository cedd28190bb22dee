//! Integration Tests - End-to-end Finance Store Behavior
//!
//! Tests the facade against mock ports (mockall) and against the
//! in-process adapters. Uses tokio::test for async tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use mockall::mock;
use mockall::predicate::*;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::sync::mpsc;

use fintrack_store::adapters::local::{JsonFileStore, MemoryKeyValueStore};
use fintrack_store::adapters::remote::MemoryDocumentStore;
use fintrack_store::domain::ids::is_local_id;
use fintrack_store::domain::looks_offline;
use fintrack_store::domain::records::{
  Account, Category, CategoryType, Frequency, Record, SortOrder, Subscription, Transaction,
  TransactionKind, TransactionStatus,
};
use fintrack_store::ports::document_store::{
  CollectionPath, DocumentStore, DocumentWrite, RemoteError, Snapshot, SnapshotListener,
  StoredDocument,
};
use fintrack_store::ports::key_value::{KeyValueStore, LocalStoreError};
use fintrack_store::ports::session::Session;
use fintrack_store::usecases::{FinanceStore, Route, StoreError};

// ---- Mock Definitions ----

mock! {
    pub Remote {}

    #[async_trait::async_trait]
    impl DocumentStore for Remote {
        async fn add_document(
            &self,
            path: &CollectionPath,
            write: DocumentWrite,
        ) -> Result<String, RemoteError>;

        async fn query(
            &self,
            path: &CollectionPath,
            order: Option<SortOrder>,
        ) -> Result<Vec<StoredDocument>, RemoteError>;

        async fn listen(
            &self,
            path: &CollectionPath,
            order: Option<SortOrder>,
        ) -> Result<SnapshotListener, RemoteError>;

        async fn update_document(
            &self,
            path: &CollectionPath,
            id: &str,
            write: DocumentWrite,
        ) -> Result<(), RemoteError>;

        async fn delete_document(&self, path: &CollectionPath, id: &str) -> Result<(), RemoteError>;
    }
}

mock! {
    pub Local {}

    #[async_trait::async_trait]
    impl KeyValueStore for Local {
        async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;
        async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;
        async fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
    }
}

// ---- Fixtures ----

fn ana() -> Session {
  Session::authenticated("ana")
}

fn lunch() -> Transaction {
  Transaction {
    kind: TransactionKind::Expense,
    amount: dec!(45.9),
    description: "Almoço".to_string(),
    date: NaiveDate::from_ymd_opt(2025, 11, 10).unwrap(),
    category: "Alimentação".to_string(),
    account: "NuConta".to_string(),
    status: TransactionStatus::Paid,
  }
}

fn dated(description: &str, day: u32) -> Transaction {
  Transaction {
    description: description.to_string(),
    date: NaiveDate::from_ymd_opt(2025, 11, day).unwrap(),
    ..lunch()
  }
}

fn category(name: &str, color: &str) -> Category {
  Category {
    name: name.to_string(),
    category_type: CategoryType::Expense,
    icon: "ShoppingCart".to_string(),
    color: color.to_string(),
  }
}

fn denied(path: &CollectionPath) -> RemoteError {
  RemoteError::PermissionDenied {
    path: path.to_string(),
  }
}

fn memory_store() -> FinanceStore<MemoryDocumentStore, MemoryKeyValueStore> {
  FinanceStore::new(
    Arc::new(MemoryDocumentStore::new()),
    Arc::new(MemoryKeyValueStore::new()),
  )
}

/// Callback that forwards every emission into a channel.
fn collector<T: Send + 'static>() -> (
  impl FnMut(Vec<Record<T>>) + Send + 'static,
  mpsc::UnboundedReceiver<Vec<Record<T>>>,
) {
  let (tx, rx) = mpsc::unbounded_channel();
  (
    move |records| {
      let _ = tx.send(records);
    },
    rx,
  )
}

/// Remote whose single `listen` replays `snapshots` and then closes.
fn scripted_remote(snapshots: Vec<Snapshot>) -> MockRemote {
  let mut remote = MockRemote::new();
  let mut script = Some(snapshots);
  remote.expect_listen().times(1).returning(move |_, _| {
    let (tx, rx) = mpsc::unbounded_channel();
    for snapshot in script.take().unwrap_or_default() {
      let _ = tx.send(snapshot);
    }
    Ok(SnapshotListener::new(rx))
  });
  remote
}

fn document(id: &str, fields: serde_json::Value) -> StoredDocument {
  StoredDocument {
    id: id.to_string(),
    fields: fields.as_object().cloned().unwrap_or_default(),
  }
}

async fn next_emission<T>(rx: &mut mpsc::UnboundedReceiver<Vec<Record<T>>>) -> Vec<Record<T>> {
  tokio::time::timeout(Duration::from_secs(1), rx.recv())
    .await
    .expect("emission within a second")
    .expect("watch still open")
}

// ---- Validation never touches a store ----

#[tokio::test]
async fn test_invalid_drafts_touch_no_store() {
  // No expectations: any call on either mock panics.
  let store = FinanceStore::new(Arc::new(MockRemote::new()), Arc::new(MockLocal::new()));

  let mut zero = lunch();
  zero.amount = dec!(0);
  let err = store.add_transaction(&ana(), zero).await.unwrap_err();
  assert_eq!(err.invalid_field(), Some("valor"));

  let err = store
    .add_account(
      &ana(),
      Account {
        name: String::new(),
        account_type: "Conta Corrente".to_string(),
        balance: None,
      },
    )
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("name"));

  let err = store
    .add_subscription(
      &ana(),
      Subscription {
        name: "Netflix".to_string(),
        amount: dec!(39.9),
        frequency: Frequency::Monthly,
        due_day: 0,
        category: "Lazer".to_string(),
      },
    )
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("dueDay"));

  let err = store
    .add_category(&ana(), category("Mercado", "blue"))
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("color"));

  let err = store
    .update_category(&ana(), "abc", category("M", "#10B981"))
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("name"));
}

// ---- Routing against mock ports ----

#[tokio::test]
async fn test_permission_denied_writes_exactly_once_locally() {
  let mut remote = MockRemote::new();
  remote
    .expect_add_document()
    .times(1)
    .returning(|path, _| Err(denied(path)));

  let mut local = MockLocal::new();
  local
    .expect_get()
    .with(eq("transactions"))
    .times(1)
    .returning(|_| Ok(None));
  local
    .expect_set()
    .withf(|key, value| key == "transactions" && value.contains("Almoço"))
    .times(1)
    .returning(|_, _| Ok(()));

  let store = FinanceStore::new(Arc::new(remote), Arc::new(local));
  let stored = store.add_transaction(&ana(), lunch()).await.unwrap();
  assert_eq!(stored.via, Route::Fallback);
  assert!(is_local_id(&stored.id));
}

#[tokio::test]
async fn test_remote_success_skips_local() {
  let mut remote = MockRemote::new();
  remote
    .expect_add_document()
    .withf(|path, write| {
      path.as_str() == "users/ana/accounts"
        && write.fields["name"] == "NuConta"
        && write.server_timestamps == vec!["createdAt"]
    })
    .times(1)
    .returning(|_, _| Ok("AbCdEfGhIjKlMnOpQrSt".to_string()));

  let store = FinanceStore::new(Arc::new(remote), Arc::new(MockLocal::new()));
  let stored = store
    .add_account(
      &ana(),
      Account {
        name: "NuConta".to_string(),
        account_type: "Conta Corrente".to_string(),
        balance: Some(dec!(100)),
      },
    )
    .await
    .unwrap();
  assert_eq!(stored.via, Route::Remote);
  assert_eq!(stored.id, "AbCdEfGhIjKlMnOpQrSt");
}

#[tokio::test]
async fn test_other_remote_errors_propagate() {
  let mut remote = MockRemote::new();
  remote.expect_add_document().returning(|_, _| {
    Err(RemoteError::Rejected {
      status: 400,
      message: "bad field".to_string(),
    })
  });
  remote
    .expect_query()
    .returning(|_, _| Err(RemoteError::Transport("timeout".to_string())));

  let store = FinanceStore::new(Arc::new(remote), Arc::new(MockLocal::new()));
  assert!(matches!(
    store.add_transaction(&ana(), lunch()).await,
    Err(StoreError::Remote(RemoteError::Rejected { status: 400, .. }))
  ));
  assert!(matches!(
    store.list::<Transaction>(&ana()).await,
    Err(StoreError::Remote(RemoteError::Transport(_)))
  ));
}

#[tokio::test]
async fn test_list_requests_kind_ordering() {
  let mut remote = MockRemote::new();
  remote
    .expect_query()
    .withf(|path, order| {
      path.as_str() == "users/ana/transactions" && *order == Some(SortOrder::descending("data"))
    })
    .times(1)
    .returning(|_, _| Ok(Vec::new()));
  remote
    .expect_query()
    .withf(|path, order| path.as_str() == "users/ana/accounts" && order.is_none())
    .times(1)
    .returning(|_, _| Ok(Vec::new()));

  let store = FinanceStore::new(Arc::new(remote), Arc::new(MockLocal::new()));
  assert!(store.list::<Transaction>(&ana()).await.unwrap().is_empty());
  assert!(store.list::<Account>(&ana()).await.unwrap().is_empty());
}

// ---- Scenarios on the in-process adapters ----

#[tokio::test]
async fn test_lunch_lists_in_date_order() {
  let store = memory_store();
  store.add_transaction(&ana(), dated("Salário", 5)).await.unwrap();
  store.add_transaction(&ana(), dated("Uber", 11)).await.unwrap();
  let stored = store.add_transaction(&ana(), lunch()).await.unwrap();

  let listed = store.list::<Transaction>(&ana()).await.unwrap();
  let descriptions: Vec<_> = listed.iter().map(|r| r.data.description.as_str()).collect();
  assert_eq!(descriptions, vec!["Uber", "Almoço", "Salário"]);
  assert_eq!(listed[1].id, stored.id);
  assert_eq!(listed[1].data, lunch());
  assert!(!looks_offline(&listed));
}

#[tokio::test]
async fn test_list_order_is_stable() {
  let store = memory_store();
  for (name, day) in [("a", 3), ("b", 3), ("c", 1), ("d", 9)] {
    store.add_transaction(&ana(), dated(name, day)).await.unwrap();
  }
  let first: Vec<_> = store
    .list::<Transaction>(&ana())
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.id)
    .collect();
  let second: Vec<_> = store
    .list::<Transaction>(&ana())
    .await
    .unwrap()
    .into_iter()
    .map(|r| r.id)
    .collect();
  assert_eq!(first, second);
}

#[tokio::test]
async fn test_fallback_records_are_listed_when_denied() {
  let store = memory_store();
  store.remote().deny_prefix("users/ana");

  let stored = store.add_transaction(&ana(), lunch()).await.unwrap();
  assert_eq!(stored.via, Route::Fallback);

  let listed = store.list::<Transaction>(&ana()).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].id, stored.id);
  assert_eq!(listed[0].data, lunch());
  assert!(looks_offline(&listed));

  // Other users keep the remote path.
  let bia = Session::authenticated("bia");
  assert_eq!(
    store.add_transaction(&bia, lunch()).await.unwrap().via,
    Route::Remote
  );
}

#[tokio::test]
async fn test_category_color_scenario() {
  let store = memory_store();
  let err = store
    .add_category(&ana(), category("Mercado", "blue"))
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("color"));
  assert!(store.list::<Category>(&ana()).await.unwrap().is_empty());

  let stored = store
    .add_category(&ana(), category("Mercado", "#10B981"))
    .await
    .unwrap();
  assert_eq!(stored.via, Route::Remote);
}

#[tokio::test]
async fn test_empty_account_name_scenario() {
  let store = memory_store();
  let err = store
    .add_account(
      &ana(),
      Account {
        name: String::new(),
        account_type: "Conta Corrente".to_string(),
        balance: None,
      },
    )
    .await
    .unwrap_err();
  assert_eq!(err.invalid_field(), Some("name"));
  assert_eq!(store.remote().write_count(), 0);
  assert_eq!(store.local().write_count(), 0);
}

#[tokio::test]
async fn test_category_update_and_delete_in_fallback() {
  let store = memory_store();
  store.remote().deny_prefix("users");

  let stored = store
    .add_category(&ana(), category("Lazer", "#ef4444"))
    .await
    .unwrap();
  let updated = store
    .update_category(&ana(), &stored.id, category("Diversão", "#EF4444"))
    .await
    .unwrap();
  assert_eq!(updated.via, Route::Fallback);

  let listed = store.list::<Category>(&ana()).await.unwrap();
  assert_eq!(listed[0].data.name, "Diversão");
  assert!(listed[0].updated_at.is_some());

  let err = store
    .update_category(&ana(), "missing", category("Outro", "#ef4444"))
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "missing"));

  store.delete_category(&ana(), &stored.id).await.unwrap();
  assert!(store.list::<Category>(&ana()).await.unwrap().is_empty());
  assert!(matches!(
    store.delete_category(&ana(), &stored.id).await,
    Err(StoreError::NotFound { .. })
  ));
}

#[tokio::test]
async fn test_category_update_and_delete_require_session() {
  // No expectations: any call on either mock panics.
  let store = FinanceStore::new(Arc::new(MockRemote::new()), Arc::new(MockLocal::new()));
  let anonymous = Session::anonymous();

  assert!(matches!(
    store
      .update_category(&anonymous, "x1", category("Lazer", "#ef4444"))
      .await,
    Err(StoreError::AuthRequired)
  ));
  assert!(matches!(
    store.delete_category(&anonymous, "x1").await,
    Err(StoreError::AuthRequired)
  ));
}

#[tokio::test]
async fn test_remote_delete_removes_category() {
  let store = memory_store();
  let stored = store
    .add_category(&ana(), category("Lazer", "#ef4444"))
    .await
    .unwrap();
  let deleted = store.delete_category(&ana(), &stored.id).await.unwrap();
  assert_eq!(deleted.via, Route::Remote);
  assert!(store.list::<Category>(&ana()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fallback_survives_reopen_on_disk() {
  let dir = tempfile::tempdir().unwrap();
  let remote = Arc::new(MemoryDocumentStore::new());
  remote.deny_prefix("users");

  let stored = {
    let local = Arc::new(JsonFileStore::new(dir.path()).await.unwrap());
    let store = FinanceStore::new(Arc::clone(&remote), local);
    store.add_transaction(&ana(), lunch()).await.unwrap()
  };

  let reopened = Arc::new(JsonFileStore::new(dir.path()).await.unwrap());
  let store = FinanceStore::new(remote, reopened);
  let listed = store.list::<Transaction>(&ana()).await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].id, stored.id);
  assert!(dir.path().join("transactions.json").exists());
}

// ---- Live subscriptions ----

#[tokio::test]
async fn test_watch_emits_empty_snapshot_then_changes() {
  let store = memory_store();
  let (on_change, mut rx) = collector::<Transaction>();
  let handle = store.watch::<Transaction, _>(&ana(), on_change).await.unwrap();
  assert!(handle.is_live());

  assert!(next_emission(&mut rx).await.is_empty());

  store.add_transaction(&ana(), dated("Salário", 5)).await.unwrap();
  store.add_transaction(&ana(), lunch()).await.unwrap();

  assert_eq!(next_emission(&mut rx).await.len(), 1);
  let latest = next_emission(&mut rx).await;
  let descriptions: Vec<_> = latest.iter().map(|r| r.data.description.as_str()).collect();
  assert_eq!(descriptions, vec!["Almoço", "Salário"]);

  handle.unsubscribe().await;
  assert_eq!(store.remote().listener_count(), 0);
}

#[tokio::test]
async fn test_watch_denied_delivers_fallback_once() {
  let store = memory_store();
  store.remote().deny_prefix("users/ana");
  store
    .add_account(
      &ana(),
      Account {
        name: "Carteira".to_string(),
        account_type: "Dinheiro Físico".to_string(),
        balance: None,
      },
    )
    .await
    .unwrap();

  let (on_change, mut rx) = collector::<Account>();
  let handle = store.watch::<Account, _>(&ana(), on_change).await.unwrap();
  assert!(!handle.is_live());

  let records = next_emission(&mut rx).await;
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].data.name, "Carteira");

  // The callback was moved into the inert handle path and dropped.
  assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_watch_revoked_mid_stream_falls_back() {
  let local = Arc::new(MemoryKeyValueStore::new());

  // A category written while this device was denied.
  let denying = Arc::new(MemoryDocumentStore::new());
  denying.deny_prefix("users");
  FinanceStore::new(denying, Arc::clone(&local))
    .add_category(&ana(), category("Mercado", "#10B981"))
    .await
    .unwrap();

  let remote = Arc::new(MemoryDocumentStore::new());
  let store = FinanceStore::new(Arc::clone(&remote), local);
  let (on_change, mut rx) = collector::<Category>();
  let _handle = store.watch::<Category, _>(&ana(), on_change).await.unwrap();
  assert!(next_emission(&mut rx).await.is_empty());

  remote.deny_prefix("users/ana");

  // Revocation delivers the fallback collection once and ends the watch.
  let emitted = next_emission(&mut rx).await;
  assert_eq!(emitted.len(), 1);
  assert!(looks_offline(&emitted));
  assert!(
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn test_watch_transport_failure_mid_stream_emits_empty_and_ends() {
  let wallet = document("w1", json!({"name": "Carteira", "type": "Dinheiro Físico"}));
  let remote = scripted_remote(vec![
    Ok(vec![wallet]),
    Err(RemoteError::Transport("reset".to_string())),
  ]);
  let store = FinanceStore::new(Arc::new(remote), Arc::new(MemoryKeyValueStore::new()));

  let (on_change, mut rx) = collector::<Account>();
  let _handle = store.watch::<Account, _>(&ana(), on_change).await.unwrap();

  let first = next_emission(&mut rx).await;
  assert_eq!(first.len(), 1);
  assert_eq!(first[0].id, "w1");
  assert!(next_emission(&mut rx).await.is_empty());
  assert!(
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn test_watch_undecodable_snapshot_emits_empty_and_ends() {
  let wallet = document("w1", json!({"name": "Carteira", "type": "Dinheiro Físico"}));
  let broken = document("w2", json!({"name": 42}));
  let remote = scripted_remote(vec![Ok(vec![wallet.clone()]), Ok(vec![wallet, broken])]);
  let store = FinanceStore::new(Arc::new(remote), Arc::new(MemoryKeyValueStore::new()));

  let (on_change, mut rx) = collector::<Account>();
  let _handle = store.watch::<Account, _>(&ana(), on_change).await.unwrap();

  assert_eq!(next_emission(&mut rx).await.len(), 1);
  assert!(next_emission(&mut rx).await.is_empty());
  assert!(
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn test_watch_transport_failure_propagates_at_setup() {
  let store = memory_store();
  store
    .remote()
    .inject_fault("users", RemoteError::Transport("offline".to_string()));
  let (on_change, _rx) = collector::<Subscription>();
  assert!(matches!(
    store.watch::<Subscription, _>(&ana(), on_change).await,
    Err(StoreError::Remote(RemoteError::Transport(_)))
  ));
}

#[tokio::test]
async fn test_watch_requires_session() {
  let store = memory_store();
  let (on_change, _rx) = collector::<Transaction>();
  assert!(matches!(
    store.watch::<Transaction, _>(&Session::anonymous(), on_change).await,
    Err(StoreError::AuthRequired)
  ));
}

#[tokio::test]
async fn test_dropping_handle_releases_listener() {
  let store = memory_store();
  let (on_change, mut rx) = collector::<Transaction>();
  let handle = store.watch::<Transaction, _>(&ana(), on_change).await.unwrap();
  let _ = next_emission(&mut rx).await;
  drop(handle);

  // The watch task drops the callback once it observes the release.
  assert!(
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
      .await
      .unwrap()
      .is_none()
  );
  assert_eq!(store.remote().listener_count(), 0);
}
