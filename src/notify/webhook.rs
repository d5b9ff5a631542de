//! HTTP webhook sink

use std::collections::HashMap;

use async_trait::async_trait;

use super::{NotificationSink, NotifierError};
use crate::monitor::NotificationEvent;

/// Posts each event as JSON to a fixed URL
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Add a request header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    async fn send_webhook(&self, event: &NotificationEvent) -> Result<(), NotifierError> {
        let mut payload = serde_json::to_value(event)
            .map_err(|e| NotifierError::Webhook(format!("Failed to encode event: {}", e)))?;
        if let Some(fields) = payload.as_object_mut() {
            fields.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }

        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifierError::Webhook(format!("Failed to send webhook: {}", e)))?;

        if !response.status().is_success() {
            return Err(NotifierError::Webhook(format!(
                "Webhook returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, event: &NotificationEvent) {
        match self.send_webhook(event).await {
            Ok(()) => tracing::debug!(event = %event.kind(), url = %self.url, "Webhook notification sent"),
            Err(e) => tracing::error!(event = %event.kind(), error = %e, "Failed to send notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_webhook_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("x-token", "secret"))
            .and(body_partial_json(serde_json::json!({
                "event": "error_entered",
                "target": "Main Hall",
                "error_count": 1,
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(reqwest::Client::new(), format!("{}/hook", server.uri()))
            .with_header("x-token", "secret");
        let event = NotificationEvent::ErrorEntered {
            target: "Main Hall".to_string(),
            message: "timeout".to_string(),
            error_count: 1,
        };
        assert!(sink.send_webhook(&event).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(reqwest::Client::new(), server.uri());
        let event = NotificationEvent::Recovered {
            target: "Main Hall".to_string(),
        };
        let err = sink.send_webhook(&event).await.unwrap_err();
        assert!(matches!(err, NotifierError::Webhook(msg) if msg.contains("500")));
    }
}
