//! Notification error types.

use thiserror::Error;

/// Why a single channel did not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The backend is missing or not configured.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but refused or failed the delivery.
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The channel task died before reporting.
    #[error("channel task aborted: {0}")]
    Aborted(String),

    #[error("invalid channel configuration: {0}")]
    Config(String),
}

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
