use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{NotificationPayload, NotificationSink};
use crate::error::DeliveryError;

/// Posts notifications as Discord webhook embeds.
#[derive(Clone)]
pub struct DiscordWebhook {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordWebhook {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts per notification; 0 is treated as 1.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn backoff(attempt: u8) {
        tokio::time::sleep(backoff_delay(attempt)).await;
    }
}

/// Longest pause between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// 500ms doubled per failed attempt, capped at [`MAX_BACKOFF`].
fn backoff_delay(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1)).min(16);
    Duration::from_millis(500u64 << exp).min(MAX_BACKOFF)
}

/// Rate limits and server errors are worth another attempt, other 4xx are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait::async_trait]
impl NotificationSink for DiscordWebhook {
    async fn send(
        &self,
        display_name: &str,
        announcement: &str,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError> {
        let body = WebhookBody::new(display_name, announcement, payload);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    if is_retryable(status) && attempt < self.max_retries {
                        tracing::debug!(%status, attempt, "webhook busy, retrying");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    let text = rsp.text().await.unwrap_or_default();
                    return Err(DeliveryError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::debug!(error = %e, attempt, "webhook request failed, retrying");
                        Self::backoff(attempt).await;
                        continue;
                    }
                    return Err(DeliveryError::Request(e));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct Thumbnail<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct Embed<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumbnail: Option<Thumbnail<'a>>,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    username: &'a str,
    content: &'a str,
    embeds: Vec<Embed<'a>>,
}

impl<'a> WebhookBody<'a> {
    fn new(username: &'a str, content: &'a str, p: &'a NotificationPayload) -> Self {
        Self {
            username,
            content,
            embeds: vec![Embed {
                title: p.title.as_deref(),
                url: p.url.as_deref(),
                description: p.body.as_deref(),
                color: p.colour,
                thumbnail: p.thumbnail.as_deref().map(|url| Thumbnail { url }),
            }],
        }
    }
}
