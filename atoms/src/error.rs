//! Error taxonomy shared by every board operation.

use thiserror::Error;

/// Result type for board operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors that can occur while resolving, authorizing or mutating board state
#[derive(Debug, Clone, Error)]
pub enum BoardError {
    /// Missing or malformed identifier / payload
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Referenced board, list, task or user is absent
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Caller has no membership on the board
    #[error("access denied")]
    AccessDenied,

    /// Caller is a member but the role is not allowed for the operation
    #[error("insufficient permissions")]
    InsufficientPermissions,

    /// Uniqueness or role invariant violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// A container changed between read and commit
    #[error("concurrent update on {container}")]
    Contended { container: String },

    /// Persistence, transaction or timeout failure
    #[error("operation failed: {0}")]
    OperationFailed(String),
}

impl BoardError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }

    /// Stable kind reported to callers. Contention surfaces as a conflict.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::NotFound { .. } => "NotFound",
            Self::AccessDenied => "AccessDenied",
            Self::InsufficientPermissions => "InsufficientPermissions",
            Self::Conflict(_) | Self::Contended { .. } => "Conflict",
            Self::OperationFailed(_) => "OperationFailed",
        }
    }

    /// Check if re-reading and retrying may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contended { .. })
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("malformed body: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BoardError::not_found("task", "abc123");
        assert_eq!(err.to_string(), "task not found: abc123");
    }

    #[test]
    fn test_contention_reports_conflict_kind() {
        let err = BoardError::Contended {
            container: "LIST#1".into(),
        };
        assert_eq!(err.kind(), "Conflict");
        assert!(err.is_retryable());
        assert!(!BoardError::conflict("duplicate").is_retryable());
    }
}
