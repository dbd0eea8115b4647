pub mod discord;

use serde::Serialize;

use crate::error::DeliveryError;

pub use discord::DiscordWebhook;
#[cfg(any(test, feature = "testing"))]
pub use crate::testing::{RecordingSink, SentNotification};

/// One entry rendered for delivery. Unset fields are omitted from the webhook body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub source_name: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub body: Option<String>,
    pub colour: Option<u32>,
    pub thumbnail: Option<String>,
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. `display_name` is the sender name shown by the
    /// webhook, `announcement` the plain-text message above the embed.
    async fn send(
        &self,
        display_name: &str,
        announcement: &str,
        payload: &NotificationPayload,
    ) -> Result<(), DeliveryError>;
}

/// Sender name used for a source's notifications.
pub fn display_name(source: &str) -> String {
    format!("{source} RSS Feed")
}

/// Message text posted with each notification.
pub fn announcement(source: &str) -> String {
    format!("New post in {source}!")
}
