//! Classifier output for one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label produced by a single prediction. Never merged with earlier results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    pub produced_at: DateTime<Utc>,
}

impl PredictionResult {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            produced_at: Utc::now(),
        }
    }
}
