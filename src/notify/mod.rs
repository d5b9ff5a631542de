//! Notification sinks
//!
//! The monitor decides what to send and when; sinks only deliver. Delivery is
//! best effort: a sink logs its own failures and never reports them back.

pub mod message;
pub mod telegram;
pub mod webhook;

pub use telegram::TelegramSink;
pub use webhook::WebhookSink;

use std::sync::Arc;

use async_trait::async_trait;

use crate::monitor::NotificationEvent;

/// Delivers notification events
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent);
}

/// Writes events to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, event: &NotificationEvent) {
        tracing::info!(
            event = %event.kind(),
            target_name = event.target().unwrap_or("-"),
            "Notification: {}",
            message::render_plain(event)
        );
    }
}

/// Fans each event out to several sinks, in order
#[derive(Default, Clone)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for MultiSink {
    async fn deliver(&self, event: &NotificationEvent) {
        for sink in &self.sinks {
            sink.deliver(event).await;
        }
    }
}

/// Notifier errors, logged by the sink that hit them
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Webhook error: {0}")]
    Webhook(String),
}
