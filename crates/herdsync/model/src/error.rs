//! Error types for herdsync-model.

use std::path::PathBuf;

use thiserror::Error;

/// Failures loading or installing a model artifact. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported artifact format version {found} (supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    #[error("artifact feature schema {found:?} does not match required features {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("a predictor is already installed for this process")]
    AlreadyInstalled,
}

/// Failures of a single prediction call. These abort one run only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    #[error("feature '{feature}' produced a non-finite value")]
    NonFinite { feature: String },

    #[error("feature '{feature}' has the wrong kind for its encoding")]
    Format { feature: String },
}

/// Result type for model loading.
pub type ModelResult<T> = Result<T, ModelError>;
