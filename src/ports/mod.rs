//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `DocumentStore`: Remote per-user document collections
//! - `KeyValueStore`: Local whole-value fallback storage
//! - `Session`: Caller identity passed into every namespaced call

pub mod document_store;
pub mod key_value;
pub mod session;
