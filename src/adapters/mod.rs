//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, file I/O, in-process state).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `remote`: Document stores (in-memory, Firestore REST)
//! - `local`: Fallback key-value stores (JSON files, in-memory)
//! - `auth`: Session loading from the environment
//! - `metrics`: Prometheus counters

pub mod auth;
pub mod local;
pub mod metrics;
pub mod remote;
