//! Domain atoms for the task board: models, pure ordering and access logic,
//! and the store they are persisted through.

pub mod access;
pub mod activity;
pub mod boards;
pub mod comments;
pub mod error;
pub mod lists;
pub mod members;
pub mod ordering;
pub mod realtime;
pub mod store;
pub mod tasks;
pub mod users;

pub use error::{BoardError, Result};

/// Fixed-width RFC 3339 timestamp so creation times sort lexically.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Fresh opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trim a user supplied title and reject empty ones.
pub fn clean_title(field: &str, title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(BoardError::invalid(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}
