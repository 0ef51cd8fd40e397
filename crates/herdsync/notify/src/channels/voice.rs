//! Spoken alerts through an external speech program.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::channel::{AlertMessage, NotificationChannel};
use crate::error::{NotifyError, NotifyResult};

/// Runs `program args... <headline>` and waits for it to finish.
///
/// The headline is passed as the last argument, so `espeak` or `say` work
/// without a wrapper script.
#[derive(Debug, Clone)]
pub struct VoiceChannel {
    program: String,
    args: Vec<String>,
}

impl VoiceChannel {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> NotifyResult<Self> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(NotifyError::Config("voice program is empty".to_string()));
        }
        Ok(Self { program, args })
    }
}

#[async_trait]
impl NotificationChannel for VoiceChannel {
    fn name(&self) -> &str {
        "voice"
    }

    async fn send(&self, message: &AlertMessage) -> NotifyResult<()> {
        let text = message.headline();
        debug!(program = %self.program, %text, "speaking alert");

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&text)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    NotifyError::Unavailable(format!("speech program {} not found", self.program))
                }
                _ => NotifyError::Delivery(format!("failed to run {}: {}", self.program, e)),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}
