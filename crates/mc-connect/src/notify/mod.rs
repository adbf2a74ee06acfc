//! Outbound notifications.
//!
//! Channels implement [`Notifier`]. The scanner never calls a channel
//! directly: it hands [`Notification`]s to a [`NotificationQueue`], whose
//! background worker fans each one out to every channel.
//!
//! # Delivery Contract
//!
//! ```text
//! scanner ──try_send──► bounded mpsc ──► worker ──► channel 1
//!    (never blocks)                          ├────► channel 2
//!                                            └────► ...
//! ```
//!
//! A full or closed queue drops the event with a warning. Channel failures
//! are logged and never reach the scanner.

pub mod discord;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use mc_core::{EventKind, NotificationsConfig, NotifierKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::NotifyError;

pub use discord::DiscordNotifier;
pub use webhook::WebhookNotifier;

/// One outbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Event kind, matched against each channel's allow-list.
    pub kind: EventKind,
    /// Short title.
    pub title: String,
    /// Human-readable description.
    pub body: String,
    /// File the event is about, if any.
    pub path: Option<Utf8PathBuf>,
}

impl Notification {
    /// Creates a notification without a path.
    #[must_use]
    pub fn new(kind: EventKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            path: None,
        }
    }

    /// Attaches the file the event is about.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs.
    fn name(&self) -> &str;

    /// Delivers `notification` if the channel accepts its kind.
    ///
    /// Returns `Ok(false)` when the kind is filtered out by the channel's
    /// allow-list.
    async fn notify(&self, notification: &Notification) -> Result<bool, NotifyError>;
}

/// Builds the configured channels.
///
/// # Errors
///
/// Returns the first channel whose configuration is unusable.
pub fn notifiers_from_config(config: &NotificationsConfig) -> Result<Vec<Arc<dyn Notifier>>, NotifyError> {
    config
        .channels
        .iter()
        .map(|channel| -> Result<Arc<dyn Notifier>, NotifyError> {
            Ok(match channel.kind {
                NotifierKind::Webhook => Arc::new(WebhookNotifier::new(&channel.url, channel.events.clone())?),
                NotifierKind::Discord => Arc::new(DiscordNotifier::new(&channel.url, channel.events.clone())?),
            })
        })
        .collect()
}

/// Background delivery queue for notifications.
///
/// # Lifecycle
///
/// 1. [`spawn`](Self::spawn) starts the worker task.
/// 2. [`sender`](Self::sender) hands out cheap, cloneable enqueue handles.
/// 3. [`shutdown`](Self::shutdown) stops intake, drains for a grace period,
///    then aborts. Dropping the queue aborts the worker immediately.
pub struct NotificationQueue {
    sender: NotificationSender,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

/// Cloneable, non-blocking handle for enqueueing notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationSender {
    tx: Option<mpsc::Sender<Notification>>,
}

impl NotificationSender {
    /// A sender that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Enqueues a notification without waiting.
    ///
    /// Never blocks and never fails: a full or closed queue drops the event.
    pub fn enqueue(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(kind = %dropped.kind, "Notification queue full; event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                debug!(kind = %dropped.kind, "Notification queue closed; event dropped");
            }
        }
    }
}

impl NotificationQueue {
    /// Starts a worker delivering to `channels` through a queue of `capacity`.
    ///
    /// Must be called from within a Tokio runtime. With no channels, no
    /// worker is started and every enqueue is a no-op.
    #[must_use]
    pub fn spawn(channels: Vec<Arc<dyn Notifier>>, capacity: usize) -> Self {
        if channels.is_empty() {
            return Self {
                sender: NotificationSender::disabled(),
                shutdown_tx: None,
                task_handle: None,
            };
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task_handle = tokio::spawn(run_worker(channels, rx, shutdown_rx));

        Self {
            sender: NotificationSender { tx: Some(tx) },
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    /// Returns an enqueue handle.
    #[must_use]
    pub fn sender(&self) -> NotificationSender {
        self.sender.clone()
    }

    /// Enqueues a notification without waiting.
    pub fn enqueue(&self, notification: Notification) {
        self.sender.enqueue(notification);
    }

    /// Stops intake, lets the worker drain for up to `grace`, then aborts it.
    pub async fn shutdown(mut self, grace: Duration) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!(grace_ms = grace.as_millis(), "Notification worker did not drain in time; aborting");
                handle.abort();
            }
        }
    }
}

impl Drop for NotificationQueue {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

async fn run_worker(
    channels: Vec<Arc<dyn Notifier>>,
    mut rx: mpsc::Receiver<Notification>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(notification) => deliver(&channels, &notification).await,
                None => return,
            },
            _ = &mut shutdown_rx => break,
        }
    }

    // Stop intake, then deliver what is already queued.
    rx.close();
    while let Some(notification) = rx.recv().await {
        deliver(&channels, &notification).await;
    }
}

async fn deliver(channels: &[Arc<dyn Notifier>], notification: &Notification) {
    for channel in channels {
        match channel.notify(notification).await {
            Ok(true) => debug!(channel = %channel.name(), kind = %notification.kind, "Notification delivered"),
            Ok(false) => {}
            Err(err) => warn!(channel = %channel.name(), kind = %notification.kind, error = %err, "Notification failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Captured(Mutex<Vec<Notification>>);

    impl Captured {
        fn kinds(&self) -> Vec<EventKind> {
            self.0.lock().unwrap().iter().map(|n| n.kind).collect()
        }
    }

    struct Capturing {
        captured: Arc<Captured>,
        accepts: Vec<EventKind>,
    }

    #[async_trait]
    impl Notifier for Capturing {
        fn name(&self) -> &str {
            "capturing"
        }

        async fn notify(&self, notification: &Notification) -> Result<bool, NotifyError> {
            if !self.accepts.contains(&notification.kind) {
                return Ok(false);
            }
            self.captured.0.lock().unwrap().push(notification.clone());
            Ok(true)
        }
    }

    struct Stuck;

    #[async_trait]
    impl Notifier for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn notify(&self, _notification: &Notification) -> Result<bool, NotifyError> {
            pending().await
        }
    }

    #[tokio::test]
    async fn test_queue_delivers_and_filters() {
        let captured = Arc::new(Captured::default());
        let channel = Arc::new(Capturing {
            captured: Arc::clone(&captured),
            accepts: vec![EventKind::Reacquire, EventKind::EndRun],
        });
        let queue = NotificationQueue::spawn(vec![channel], 8);

        let sender = queue.sender();
        sender.enqueue(Notification::new(EventKind::StartRun, "Run started", ""));
        sender.enqueue(Notification::new(EventKind::Reacquire, "Reacquire", "x").with_path("/tv/a.mkv"));
        queue.enqueue(Notification::new(EventKind::EndRun, "Run finished", ""));

        queue.shutdown(Duration::from_secs(5)).await;
        assert_eq!(captured.kinds(), [EventKind::Reacquire, EventKind::EndRun]);

        // The worker is gone; enqueueing is still harmless.
        sender.enqueue(Notification::new(EventKind::EndRun, "late", ""));
    }

    #[tokio::test]
    async fn test_enqueue_never_blocks_on_a_stuck_channel() {
        let queue = NotificationQueue::spawn(vec![Arc::new(Stuck)], 1);
        for _ in 0..100 {
            queue.enqueue(Notification::new(EventKind::ManualReview, "Review", ""));
        }
        tokio::time::timeout(Duration::from_secs(5), queue.shutdown(Duration::from_millis(50)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_queue_without_channels_is_inert() {
        let queue = NotificationQueue::spawn(Vec::new(), 4);
        queue.enqueue(Notification::new(EventKind::StartRun, "Run started", ""));
        queue.shutdown(Duration::from_millis(10)).await;
        NotificationSender::disabled().enqueue(Notification::new(EventKind::EndRun, "x", ""));
    }

    #[test]
    fn test_notifiers_from_config() {
        let config = NotificationsConfig {
            queue_capacity: 4,
            channels: vec![
                mc_core::NotifierConfig {
                    kind: NotifierKind::Webhook,
                    url: "http://hooks.local/mediacheck".to_owned(),
                    events: vec![EventKind::Reacquire],
                },
                mc_core::NotifierConfig {
                    kind: NotifierKind::Discord,
                    url: "https://discord.com/api/webhooks/123456789012345678/token_ABC-1".to_owned(),
                    events: vec![EventKind::EndRun],
                },
            ],
        };
        let channels = notifiers_from_config(&config).unwrap();
        let names: Vec<&str> = channels.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["webhook", "discord"]);
    }
}
