//! Telegram Bot API sink

use async_trait::async_trait;

use super::message::render_html;
use super::{NotificationSink, NotifierError};
use crate::monitor::NotificationEvent;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends each event as an HTML message to one chat
pub struct TelegramSink {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(
        client: reqwest::Client,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Point the sink at another Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Post one message
    pub async fn send_message(&self, text: &str) -> Result<(), NotifierError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            // reqwest errors embed the URL, which carries the bot token
            .map_err(|e| NotifierError::Telegram(e.without_url().to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotifierError::Telegram(format!(
                "status {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn deliver(&self, event: &NotificationEvent) {
        match self.send_message(&render_html(event)).await {
            Ok(()) => tracing::info!(event = %event.kind(), "Telegram notification sent"),
            Err(e) => tracing::error!(
                event = %event.kind(),
                error = %e,
                "Failed to send Telegram notification"
            ),
        }
    }
}
