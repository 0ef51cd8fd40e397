//! Channel capability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herdsync_types::{Severity, TwinId};
use serde::Serialize;

use crate::error::NotifyResult;

/// What every channel is asked to deliver. Channels render their own text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub twin_id: TwinId,
    pub label: String,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
}

impl AlertMessage {
    pub fn new(twin_id: TwinId, label: impl Into<String>, severity: Severity) -> Self {
        Self {
            twin_id,
            label: label.into(),
            severity,
            raised_at: Utc::now(),
        }
    }

    /// Primary-language sentence, e.g. `Alert! Cow health status is mastitis`.
    /// Severity travels separately and does not change the wording.
    pub fn headline(&self) -> String {
        format!("Alert! Cow health status is {}", self.label)
    }
}

/// A single notification medium.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable name used in notification events and logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn send(&self, message: &AlertMessage) -> NotifyResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline_wording_ignores_severity() {
        let alert = AlertMessage::new(TwinId::new("co-01"), "lameness", Severity::Alert);
        let info = AlertMessage::new(TwinId::new("co-01"), "estrus", Severity::Info);

        assert_eq!(alert.headline(), "Alert! Cow health status is lameness");
        assert_eq!(info.headline(), "Alert! Cow health status is estrus");
    }
}
