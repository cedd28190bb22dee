//! Store Errors - What the Persistence Facade Surfaces to Callers
//!
//! Permission denials from the remote store never appear here: they
//! are absorbed by the local fallback. Everything else is reported
//! verbatim so the UI layer can display it.

use thiserror::Error;

use crate::domain::records::{EntityKind, RecordId};
use crate::domain::validation::ValidationError;
use crate::ports::document_store::RemoteError;
use crate::ports::key_value::LocalStoreError;

#[derive(Debug, Error)]
pub enum StoreError {
  /// Draft rejected before any store was touched.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// The session carries no signed-in user.
  #[error("authentication required")]
  AuthRequired,

  /// Update or delete target does not exist.
  #[error("{kind} record `{id}` not found")]
  NotFound { kind: EntityKind, id: RecordId },

  /// Remote failure other than a permission denial.
  #[error("remote store error: {0}")]
  Remote(#[from] RemoteError),

  /// Fallback store I/O failure or corrupt collection.
  #[error("local store error: {0}")]
  Local(#[from] LocalStoreError),

  /// A record could not be turned into a document.
  #[error("record encoding failed: {0}")]
  Encoding(#[from] serde_json::Error),
}

impl StoreError {
  /// Field named by a validation failure, if this is one.
  pub const fn invalid_field(&self) -> Option<&'static str> {
    match self {
      Self::Validation(err) => Some(err.field),
      _ => None,
    }
  }
}
