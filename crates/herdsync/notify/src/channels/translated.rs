//! Secondary-language text alerts.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::channel::{AlertMessage, NotificationChannel};
use crate::error::{NotifyError, NotifyResult};

/// Kannada rendering of "Alert! Cow health status is {label}".
pub const KANNADA_TEMPLATE: &str = "ಎಚ್ಚರಿಕೆ! ಹಸುವಿನ ಆರೋಗ್ಯ ಸ್ಥಿತಿ {label} ಆಗಿದೆ.";

const PLACEHOLDER: &str = "{label}";

#[derive(Debug, Serialize)]
struct Record<'a> {
    twin_id: &'a str,
    label: &'a str,
    severity: String,
    text: &'a str,
    raised_at: String,
}

/// Renders a template and appends it as a JSON line to `output_path`, or
/// logs it when no path is configured.
#[derive(Debug, Clone)]
pub struct TranslatedTextChannel {
    template: String,
    output_path: Option<PathBuf>,
}

impl TranslatedTextChannel {
    pub fn new(template: impl Into<String>, output_path: Option<PathBuf>) -> NotifyResult<Self> {
        let template = template.into();
        if !template.contains(PLACEHOLDER) {
            return Err(NotifyError::Config(format!(
                "translated template must contain {}",
                PLACEHOLDER
            )));
        }
        Ok(Self {
            template,
            output_path,
        })
    }

    pub fn kannada(output_path: Option<PathBuf>) -> Self {
        Self {
            template: KANNADA_TEMPLATE.to_string(),
            output_path,
        }
    }

    pub fn render(&self, message: &AlertMessage) -> String {
        self.template.replace(PLACEHOLDER, &message.label)
    }
}

#[async_trait]
impl NotificationChannel for TranslatedTextChannel {
    fn name(&self) -> &str {
        "translated"
    }

    async fn send(&self, message: &AlertMessage) -> NotifyResult<()> {
        let text = self.render(message);

        let Some(path) = &self.output_path else {
            info!(twin_id = %message.twin_id, severity = %message.severity, %text, "translated alert");
            return Ok(());
        };

        let record = Record {
            twin_id: message.twin_id.as_str(),
            label: &message.label,
            severity: message.severity.to_string(),
            text: &text,
            raised_at: message.raised_at.to_rfc3339(),
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| NotifyError::Delivery(format!("unserializable alert: {}", e)))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| NotifyError::Unavailable(format!("{}: {}", path.display(), e)))?;
        file.write_all(&line)
            .await
            .map_err(|e| NotifyError::Delivery(format!("{}: {}", path.display(), e)))?;
        file.flush()
            .await
            .map_err(|e| NotifyError::Delivery(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}
