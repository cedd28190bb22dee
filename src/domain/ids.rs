//! Record identifier shapes.
//!
//! The remote store assigns 20-character alphanumeric auto-ids; the
//! local fallback assigns hyphenated UUID v4 strings. The two shapes
//! never collide, which is what the offline heuristic keys on.

use uuid::Uuid;

use super::records::Record;

const AUTO_ID_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a remote auto-id.
pub const AUTO_ID_LEN: usize = 20;

/// Fresh identifier for a record written to the local fallback.
pub fn new_local_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fresh remote-style auto-id (20 chars from `[A-Za-z0-9]`).
pub fn new_auto_id() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes
        .iter()
        .take(AUTO_ID_LEN)
        .map(|b| char::from(AUTO_ID_ALPHABET[usize::from(*b) % AUTO_ID_ALPHABET.len()]))
        .collect()
}

/// True when `id` has the shape the local fallback assigns.
pub fn is_local_id(id: &str) -> bool {
    id.len() == 36 && Uuid::try_parse(id).is_ok()
}

/// Whether a result set looks like it was served by the local fallback.
///
/// Views use this to show the offline banner. It is a heuristic: an
/// empty set is never flagged.
pub fn looks_offline<T>(records: &[Record<T>]) -> bool {
    records.iter().any(|r| is_local_id(&r.id))
}
