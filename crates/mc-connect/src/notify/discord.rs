//! Discord webhook channel.

use async_trait::async_trait;
use mc_core::EventKind;
use reqwest::Client;
use serde::Serialize;

use super::webhook::build_client;
use super::{Notification, Notifier};
use crate::NotifyError;

const CHANNEL: &str = "discord";
const WEBHOOK_PREFIXES: [&str; 2] = [
    "https://discord.com/api/webhooks/",
    "https://discordapp.com/api/webhooks/",
];

#[derive(Debug, Serialize)]
struct Message<'a> {
    username: &'static str,
    embeds: [Embed<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: String,
}

impl<'a> Message<'a> {
    fn from_notification(notification: &'a Notification) -> Self {
        let description = match &notification.path {
            Some(path) if notification.body.is_empty() => path.to_string(),
            Some(path) => format!("{}\n{path}", notification.body),
            None => notification.body.clone(),
        };
        Self {
            username: "mediacheck",
            embeds: [Embed {
                title: &notification.title,
                description,
            }],
        }
    }
}

/// Posts an embed to a Discord webhook for every allowed event.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http: Client,
    url: String,
    events: Vec<EventKind>,
}

impl DiscordNotifier {
    /// Creates a channel posting to the Discord webhook `url`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] if `url` is not a Discord webhook URL.
    pub fn new(url: &str, events: Vec<EventKind>) -> Result<Self, NotifyError> {
        if !WEBHOOK_PREFIXES.iter().any(|prefix| url.starts_with(prefix)) {
            return Err(NotifyError::config(CHANNEL, "not a discord webhook url"));
        }
        Ok(Self {
            http: build_client(CHANNEL)?,
            url: url.to_owned(),
            events,
        })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn notify(&self, notification: &Notification) -> Result<bool, NotifyError> {
        if !self.events.contains(&notification.kind) {
            return Ok(false);
        }
        self.http
            .post(&self.url)
            .json(&Message::from_notification(notification))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| NotifyError::Delivery {
                channel: CHANNEL.to_owned(),
                source,
            })?;
        Ok(true)
    }
}
