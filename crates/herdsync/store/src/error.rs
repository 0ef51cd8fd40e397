//! Store error types.

use herdsync_types::TwinId;
use thiserror::Error;

/// Failures reported by a twin store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The twin does not exist.
    #[error("twin not found: {0}")]
    NotFound(TwinId),

    /// Credentials missing or refused.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network trouble, throttling or a server-side hiccup; safe to retry.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The twin changed underneath the caller (precondition or op mismatch).
    #[error("concurrent modification of twin {twin_id}: {reason}")]
    Conflict { twin_id: TwinId, reason: String },

    /// The store refused the request for any other reason.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Whether a later attempt may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || self.is_conflict()
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
