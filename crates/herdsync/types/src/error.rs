//! Error types for herdsync-types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::twin::AttributeKind;

/// A present attribute whose stored kind is not the one the feature needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: AttributeKind,
    pub found: AttributeKind,
}

/// Data-quality failures raised while building a feature vector.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Required attributes absent from the twin, in declared order.
    #[error("missing required fields: {}", missing.join(", "))]
    MissingFields { missing: Vec<String> },

    /// Required attributes present with the wrong kind, in declared order.
    #[error("type mismatch: {}", describe(mismatches))]
    TypeMismatch { mismatches: Vec<FieldMismatch> },

    /// The configured required-feature list does not describe a feature vector.
    #[error("invalid feature schema: {0}")]
    Schema(String),
}

fn describe(mismatches: &[FieldMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("{} expected {} found {}", m.field, m.expected, m.found))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;
