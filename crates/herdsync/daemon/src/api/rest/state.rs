//! Shared application state for the REST API

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::pipeline::SyncOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline driver, also used for direct twin reads
    pub orchestrator: Arc<SyncOrchestrator>,

    /// Cancellation flag handed to on-demand runs
    pub cancel: watch::Receiver<bool>,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(orchestrator: Arc<SyncOrchestrator>, cancel: watch::Receiver<bool>) -> Self {
        Self {
            orchestrator,
            cancel,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
