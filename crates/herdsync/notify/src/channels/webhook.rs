//! Push notifications through an HTTP webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::channel::{AlertMessage, NotificationChannel};
use crate::error::{NotifyError, NotifyResult};

#[derive(Debug, Serialize)]
struct Payload<'a> {
    message: String,
    label: &'a str,
    twin_id: &'a str,
    severity: String,
}

/// POSTs `{message, label, twin_id, severity}` to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: reqwest::Url,
}

impl WebhookChannel {
    pub fn new(url: &str, timeout: Duration) -> NotifyResult<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url {}: {}", url, e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &AlertMessage) -> NotifyResult<()> {
        let payload = Payload {
            message: message.headline(),
            label: &message.label,
            twin_id: message.twin_id.as_str(),
            severity: message.severity.to_string(),
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Delivery(format!("webhook returned {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use herdsync_types::{Severity, TwinId};
    use serde_json::Value;

    type Inbox = Arc<Mutex<Vec<Value>>>;

    async fn receive(State(inbox): State<Inbox>, Json(body): Json<Value>) -> StatusCode {
        inbox.lock().unwrap().push(body);
        StatusCode::ACCEPTED
    }

    async fn serve(inbox: Inbox) -> String {
        let app = Router::new()
            .route("/hook", post(receive))
            .route("/down", post(|| async { StatusCode::BAD_GATEWAY }))
            .with_state(inbox);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            WebhookChannel::new("::", Duration::from_secs(1)),
            Err(NotifyError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_posts_payload() {
        let inbox = Inbox::default();
        let base = serve(inbox.clone()).await;
        let message = AlertMessage::new(TwinId::new("co-01"), "estrus", Severity::Info);

        let channel = WebhookChannel::new(&format!("{}/hook", base), Duration::from_secs(5)).unwrap();
        channel.send(&message).await.unwrap();

        let received = inbox.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["label"], "estrus");
        assert_eq!(received[0]["twin_id"], "co-01");
        assert_eq!(received[0]["severity"], "info");
        assert_eq!(received[0]["message"], "Alert! Cow health status is estrus");

        let down = WebhookChannel::new(&format!("{}/down", base), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            down.send(&message).await,
            Err(NotifyError::Delivery(_))
        ));
    }
}
