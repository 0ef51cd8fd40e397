//! Alert dispatch records.

use serde::{Deserialize, Serialize};

/// How urgent an alert is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Noteworthy but not a health problem (e.g. estrus).
    Info,
    Alert,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Alert => f.write_str("alert"),
        }
    }
}

/// One channel that did not deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: String,
}

/// Outcome of fanning an abnormal label out to every channel.
///
/// Transient: created once per abnormal prediction and dropped with the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub severity: Severity,
    pub label: String,
    pub attempted: Vec<String>,
    pub succeeded: Vec<String>,
    pub failures: Vec<ChannelFailure>,
}

impl NotificationEvent {
    pub fn new(severity: Severity, label: impl Into<String>) -> Self {
        Self {
            severity,
            label: label.into(),
            attempted: Vec::new(),
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn all_delivered(&self) -> bool {
        self.failures.is_empty() && self.attempted.len() == self.succeeded.len()
    }
}
