//! Best-effort fan-out of abnormal labels.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use herdsync_types::{ChannelFailure, NotificationEvent, Severity, TwinId};
use tracing::{debug, info, instrument, warn};

use crate::channel::{AlertMessage, NotificationChannel};
use crate::error::NotifyError;

const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Decides whether a label warrants a notification and delivers it to every
/// configured channel.
#[derive(Clone)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    normal_label: String,
    info_labels: Vec<String>,
    channel_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(normal_label: impl Into<String>) -> Self {
        Self {
            channels: Vec::new(),
            normal_label: normal_label.into().to_lowercase(),
            info_labels: Vec::new(),
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Labels that are abnormal but reported as [`Severity::Info`].
    pub fn with_info_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.info_labels = labels
            .into_iter()
            .map(|l| l.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = timeout;
        self
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }

    /// True iff `label` differs from the normal label, ignoring case.
    pub fn should_notify(&self, label: &str) -> bool {
        label.to_lowercase() != self.normal_label
    }

    pub fn severity_for(&self, label: &str) -> Severity {
        if self.info_labels.contains(&label.to_lowercase()) {
            Severity::Info
        } else {
            Severity::Alert
        }
    }

    /// Deliver `label` for `twin_id` to all channels.
    ///
    /// Returns `None` when the label is normal. Otherwise every channel is
    /// attempted concurrently, each under its own timeout, and the outcome
    /// of each is recorded in the returned event. Never fails.
    #[instrument(skip(self), fields(channels = self.channels.len()))]
    pub async fn dispatch(&self, twin_id: &TwinId, label: &str) -> Option<NotificationEvent> {
        if !self.should_notify(label) {
            debug!("label is normal, nothing to notify");
            return None;
        }

        let severity = self.severity_for(label);
        let message = Arc::new(AlertMessage::new(twin_id.clone(), label, severity));
        let mut event = NotificationEvent::new(severity, label);

        let tasks = self.channels.iter().map(|channel| {
            let channel = Arc::clone(channel);
            let message = Arc::clone(&message);
            let timeout = self.channel_timeout;
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(timeout, channel.send(&message)).await {
                    Ok(result) => result,
                    Err(_) => Err(NotifyError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            });
            async move {
                handle
                    .await
                    .unwrap_or_else(|e| Err(NotifyError::Aborted(e.to_string())))
            }
        });
        let results = join_all(tasks).await;

        for (channel, result) in self.channels.iter().zip(results) {
            let name = channel.name().to_string();
            event.attempted.push(name.clone());
            match result {
                Ok(()) => {
                    debug!(channel = %name, "notification delivered");
                    event.succeeded.push(name);
                }
                Err(error) => {
                    warn!(channel = %name, %error, "notification channel failed");
                    event.failures.push(ChannelFailure {
                        channel: name,
                        error: error.to_string(),
                    });
                }
            }
        }

        info!(
            %severity,
            delivered = event.succeeded.len(),
            failed = event.failures.len(),
            "notification dispatched"
        );
        Some(event)
    }
}
