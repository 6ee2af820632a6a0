//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, so the same call works on a
//! plain connection or inside an open `Transaction`.

mod assessment;
mod chat;
mod patient;
mod system_log;

pub use assessment::*;
pub use chat::*;
pub use patient::*;
pub use system_log::*;

use super::DatabaseError;

/// Encode a name list as the JSON text stored in list columns.
pub(crate) fn encode_list(items: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

/// Decode a stored list column. Corrupt text decodes as an empty list.
pub(crate) fn decode_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Map `QueryReturnedNoRows` to `None`.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, DatabaseError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
