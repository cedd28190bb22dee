//! Finance Store Benchmarks — Validation and Fallback Paths
//!
//! Benchmarks draft validation and the whole-collection fallback write,
//! whose cost grows with the size of the local collection.
//!
//! Run with: cargo bench --bench store_bench

use std::sync::Arc;

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use fintrack_store::adapters::local::MemoryKeyValueStore;
use fintrack_store::adapters::remote::MemoryDocumentStore;
use fintrack_store::domain::records::{
  Category, CategoryType, Entity, Transaction, TransactionKind, TransactionStatus,
};
use fintrack_store::ports::session::Session;
use fintrack_store::usecases::FinanceStore;

fn lunch() -> Transaction {
  Transaction {
    kind: TransactionKind::Expense,
    amount: Decimal::new(459, 1),
    description: "Almoço".to_string(),
    date: NaiveDate::from_ymd_opt(2025, 11, 10).unwrap(),
    category: "Alimentação".to_string(),
    account: "NuConta".to_string(),
    status: TransactionStatus::Paid,
  }
}

/// Benchmark draft validation, including the hex color regex.
fn bench_validate(c: &mut Criterion) {
  let tx = lunch();
  let category = Category {
    name: "Mercado".to_string(),
    category_type: CategoryType::Expense,
    icon: "ShoppingCart".to_string(),
    color: "#10B981".to_string(),
  };

  c.bench_function("validate_transaction", |b| {
    b.iter(|| black_box(&tx).validate());
  });
  c.bench_function("validate_category", |b| {
    b.iter(|| black_box(&category).validate());
  });
}

/// Benchmark a fallback add against collections of growing size.
fn bench_fallback_add(c: &mut Criterion) {
  let runtime = tokio::runtime::Runtime::new().unwrap();
  let session = Session::authenticated("bench");
  let mut group = c.benchmark_group("fallback_add");

  for existing in [0usize, 100, 1_000] {
    let remote = Arc::new(MemoryDocumentStore::new());
    remote.deny_prefix("users");
    let store = FinanceStore::new(remote, Arc::new(MemoryKeyValueStore::new()));
    runtime.block_on(async {
      for _ in 0..existing {
        store.add_transaction(&session, lunch()).await.unwrap();
      }
    });

    group.bench_with_input(BenchmarkId::from_parameter(existing), &existing, |b, _| {
      b.to_async(&runtime)
        .iter(|| async { store.add_transaction(&session, lunch()).await.unwrap() });
    });
  }
  group.finish();
}

/// Benchmark an ordered remote list of 500 transactions.
fn bench_remote_list(c: &mut Criterion) {
  let runtime = tokio::runtime::Runtime::new().unwrap();
  let session = Session::authenticated("bench");
  let store = FinanceStore::new(
    Arc::new(MemoryDocumentStore::new()),
    Arc::new(MemoryKeyValueStore::new()),
  );
  runtime.block_on(async {
    for day in 0..500u32 {
      let mut tx = lunch();
      tx.date = NaiveDate::from_ymd_opt(2025, 1 + day % 12, 1 + day % 28).unwrap();
      store.add_transaction(&session, tx).await.unwrap();
    }
  });

  c.bench_function("remote_list_500", |b| {
    b.to_async(&runtime)
      .iter(|| async { store.list::<Transaction>(&session).await.unwrap() });
  });
}

criterion_group!(benches, bench_validate, bench_fallback_add, bench_remote_list);
criterion_main!(benches);
