//! Domain layer - Finance records and their invariants.
//!
//! Pure types and validation for the four entity kinds. Nothing here
//! performs I/O; stores and transports live behind `crate::ports`.

pub mod icons;
pub mod ids;
pub mod records;
pub mod validation;

// Re-export core types for convenience
pub use ids::{is_local_id, looks_offline};
pub use records::{
    Account, Category, CategoryType, Direction, Entity, EntityKind, Frequency,
    Record, RecordId, SortOrder, Subscription, Transaction, TransactionKind,
    TransactionStatus,
};
pub use validation::{ValidationError, ValidationReason};
