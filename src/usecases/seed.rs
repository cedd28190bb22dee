//! Sample Data - Demo Transactions for a Fresh Namespace
//!
//! Each sample goes through the regular add path, so every one of them
//! independently lands remotely or in the fallback.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, instrument};

use super::errors::StoreError;
use super::finance_store::{FinanceStore, Stored};
use crate::domain::records::{Transaction, TransactionKind, TransactionStatus};
use crate::ports::document_store::DocumentStore;
use crate::ports::key_value::KeyValueStore;
use crate::ports::session::Session;

const LUNCH_DATE: NaiveDate = calendar_date(2025, 11, 10);
const SALARY_DATE: NaiveDate = calendar_date(2025, 11, 5);
const RIDE_DATE: NaiveDate = calendar_date(2025, 11, 11);

/// Only evaluated in const items, so a bad date fails the build.
const fn calendar_date(year: i32, month: u32, day: u32) -> NaiveDate {
  match NaiveDate::from_ymd_opt(year, month, day) {
    Some(date) => date,
    None => panic!("invalid sample date"),
  }
}

fn paid(
  kind: TransactionKind,
  amount: Decimal,
  description: &str,
  date: NaiveDate,
  category: &str,
  account: &str,
) -> Transaction {
  Transaction {
    kind,
    amount,
    description: description.to_string(),
    date,
    category: category.to_string(),
    account: account.to_string(),
    status: TransactionStatus::Paid,
  }
}

/// The three demo transactions, in insertion order.
pub fn sample_transactions() -> Vec<Transaction> {
  vec![
    paid(TransactionKind::Expense, dec!(45.9), "Almoço", LUNCH_DATE, "Alimentação", "NuConta"),
    paid(TransactionKind::Income, dec!(5200), "Salário", SALARY_DATE, "Receita", "NuConta"),
    paid(TransactionKind::Expense, dec!(18.5), "Uber", RIDE_DATE, "Transporte", "Carteira"),
  ]
}

/// Add the demo transactions for `session`'s user.
///
/// Stops at the first failure; samples already stored stay stored.
#[instrument(skip_all, fields(user_id = session.user_id()))]
pub async fn seed_transactions<R: DocumentStore, L: KeyValueStore>(
  store: &FinanceStore<R, L>,
  session: &Session,
) -> Result<Vec<Stored>, StoreError> {
  let mut stored = Vec::new();
  for sample in sample_transactions() {
    stored.push(store.add_transaction(session, sample).await?);
  }
  info!(count = stored.len(), "Sample transactions seeded");
  Ok(stored)
}
