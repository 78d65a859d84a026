//! Reply delivery to the chat surface. Strictly best-effort: a lost
//! notification is logged and counted, never retried or escalated — there is
//! no durable queue to retry from.

use crate::config::ChatConfig;
use crate::domain::ReplyChannel;
use crate::telemetry::counters;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const NOTIFY_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("reply delivery failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("reply transport returned status {status}")]
    Status { status: u16 },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: &ReplyChannel, text: &str) -> Result<(), NotifyError>;
}

/// Posts messages to the chat API's channel-message endpoint.
pub struct ChatNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl ChatNotifier {
    pub fn new(chat: &ChatConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(NOTIFY_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: chat.api_base.trim_end_matches('/').to_string(),
            bot_token: chat.bot_token.clone(),
        })
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    async fn notify(&self, channel: &ReplyChannel, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&serde_json::json!({ "content": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

/// Deliver a reply, absorbing any failure per the best-effort contract.
pub async fn send_best_effort(notifier: &dyn Notifier, channel: &ReplyChannel, text: &str) {
    if let Err(err) = notifier.notify(channel, text).await {
        counters().record_notify_failure();
        tracing::warn!(
            channel = %channel,
            error = %err,
            "failed to deliver chat reply"
        );
    }
}
