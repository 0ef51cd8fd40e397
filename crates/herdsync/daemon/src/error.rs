//! Error types for herdsync-daemon

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herdsync_model::{ModelError, PredictionError};
use herdsync_store::StoreError;
use herdsync_types::{TwinId, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Why a single sync run stopped. Contained to that twin.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("twin {0} not found")]
    NotFound(TwinId),

    #[error("authentication failed: {0}")]
    Auth(String),

    /// Missing fields or type mismatches; no write is attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transient store failure after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    #[error("write conflict persisted after {attempts} attempt(s): {message}")]
    Conflict { attempts: u32, message: String },

    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictionError),

    #[error("store rejected request: {0}")]
    Rejected(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("lease for twin {twin_id} not acquired within {timeout_ms}ms")]
    LeaseTimeout { twin_id: TwinId, timeout_ms: u64 },
}

impl SyncError {
    /// Classify a store failure that is not (or no longer) retried.
    pub fn from_store(err: StoreError, attempts: u32) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            StoreError::Auth(message) => SyncError::Auth(message),
            StoreError::Transient(message) => SyncError::Transient { attempts, message },
            StoreError::Conflict { reason, .. } => SyncError::Conflict {
                attempts,
                message: reason,
            },
            StoreError::Rejected(message) => SyncError::Rejected(message),
        }
    }

    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "NOT_FOUND",
            SyncError::Auth(_) => "AUTH_ERROR",
            SyncError::Validation(ValidationError::MissingFields { .. }) => "MISSING_FIELDS",
            SyncError::Validation(ValidationError::TypeMismatch { .. }) => "TYPE_MISMATCH",
            SyncError::Validation(ValidationError::Schema(_)) => "SCHEMA_ERROR",
            SyncError::Transient { .. } => "TRANSIENT_ERROR",
            SyncError::Conflict { .. } => "CONFLICT",
            SyncError::Prediction(_) => "PREDICTION_ERROR",
            SyncError::Rejected(_) => "REJECTED",
            SyncError::Cancelled => "CANCELLED",
            SyncError::LeaseTimeout { .. } => "LEASE_TIMEOUT",
        }
    }
}

/// Daemon-level errors. All are fatal.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Classifier could not be loaded
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Twin store unreachable or refusing credentials at startup
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Notification channel misconfigured
    #[error("notification setup error: {0}")]
    Notify(#[from] herdsync_notify::NotifyError),

    /// Server startup error
    #[error("server error: {0}")]
    Server(String),

    /// One or more runs of a one-shot sweep aborted
    #[error("{aborted} of {total} sync run(s) aborted")]
    SweepFailed { aborted: usize, total: usize },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Twin absent from the store
    #[error("Cow not found")]
    CowNotFound(TwinId),

    /// Another run holds the twin
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store unavailable or refusing access
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::CowNotFound(id),
            other => ApiError::Store(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub detail: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::CowNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Store(StoreError::Transient(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "STORE_UNAVAILABLE")
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            detail: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::CowNotFound(TwinId::new("co-09"))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("busy".to_string())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Transient("503".to_string()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(StoreError::Auth("expired".to_string()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_classify() {
        assert_eq!(
            SyncError::from_store(StoreError::NotFound(TwinId::new("co-01")), 1),
            SyncError::NotFound(TwinId::new("co-01"))
        );
        let err = SyncError::from_store(StoreError::Transient("timeout".to_string()), 4);
        assert_eq!(err.code(), "TRANSIENT_ERROR");
        assert!(err.to_string().contains("4 attempt(s)"));
    }
}
