//! Remote Document Store Adapters
//!
//! Implements the `DocumentStore` port: an in-process store with
//! configurable access rules, and a Firestore REST client.

pub mod firestore;
pub mod firestore_value;
pub mod memory;

pub use firestore::{FirestoreConfig, FirestoreRestStore};
pub use memory::MemoryDocumentStore;
