//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain validation with the store ports. The facade is
//! the only way records get written or read.
//!
//! Use cases:
//! - `FinanceStore`: add/list/watch per entity kind, category update/delete
//! - `FallbackCollections`: local read-modify-write behind the facade
//! - `seed`: demo transactions for a fresh namespace

pub mod errors;
pub mod fallback;
pub mod finance_store;
pub mod seed;

pub use errors::StoreError;
pub use finance_store::{ConnectionStatus, FinanceStore, Route, Stored, WatchHandle};
