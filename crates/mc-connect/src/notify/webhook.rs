//! Generic JSON webhook channel.

use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::EventKind;
use reqwest::Client;
use serde::Serialize;

use super::{Notification, Notifier};
use crate::NotifyError;

const CHANNEL: &str = "webhook";

#[derive(Debug, Serialize)]
struct Payload<'a> {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a Utf8Path>,
}

/// POSTs `{"type": ..., "path": ...}` to a URL for every allowed event.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    events: Vec<EventKind>,
}

impl WebhookNotifier {
    /// Creates a channel posting to `url` for the listed event kinds.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Config`] for an empty URL or if the HTTP client
    /// cannot be built.
    pub fn new(url: &str, events: Vec<EventKind>) -> Result<Self, NotifyError> {
        if url.trim().is_empty() {
            return Err(NotifyError::config(CHANNEL, "url is empty"));
        }
        Ok(Self {
            http: build_client(CHANNEL)?,
            url: url.to_owned(),
            events,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn notify(&self, notification: &Notification) -> Result<bool, NotifyError> {
        if !self.events.contains(&notification.kind) {
            return Ok(false);
        }
        let payload = Payload {
            kind: notification.kind,
            path: notification.path.as_deref(),
        };
        self.http
            .post(&self.url)
            .json(&payload)
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

pub(super) fn build_client(channel: &str) -> Result<Client, NotifyError> {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("mediacheck/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| NotifyError::config(channel, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let with_path = Payload {
            kind: EventKind::Reacquire,
            path: Some(Utf8Path::new("/tv/Show/S01E01.mkv")),
        };
        assert_eq!(
            serde_json::to_value(&with_path).unwrap(),
            serde_json::json!({"type": "reacquire", "path": "/tv/Show/S01E01.mkv"})
        );

        let without_path = Payload {
            kind: EventKind::EndRun,
            path: None,
        };
        assert_eq!(
            serde_json::to_value(&without_path).unwrap(),
            serde_json::json!({"type": "endrun"})
        );
    }

    #[test]
    fn test_empty_url_is_rejected() {
        assert!(matches!(
            WebhookNotifier::new("  ", vec![EventKind::EndRun]),
            Err(NotifyError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_filtered_event_is_not_sent() {
        // Nothing listens on this port; a send attempt would fail.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", vec![EventKind::Reacquire]).unwrap();
        let sent = notifier
            .notify(&Notification::new(EventKind::StartRun, "Run started", ""))
            .await
            .unwrap();
        assert!(!sent);
    }
}
