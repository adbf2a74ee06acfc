//! Media-manager clients and notification channels for mediacheck.
//!
//! Everything in this crate talks to something outside the process:
//!
//! - [`owner`] - Sonarr, Radarr and Lidarr clients behind the
//!   [`MediaOwner`] trait, collected in an [`OwnerRegistry`]
//! - [`notify`] - Webhook and Discord channels behind the [`Notifier`]
//!   trait, fed through a non-blocking [`NotificationQueue`]
//!
//! # Path Translation
//!
//! The scanner and the media managers may see the library under different
//! mount points. Each owner carries a list of mappings; the first mapping
//! whose scanner-side prefix occurs in a path rewrites it:
//!
//! ```
//! use mc_connect::translate_path;
//! use mc_core::PathMapping;
//!
//! let mappings = vec![PathMapping {
//!     manager: "/tv/".to_owned(),
//!     local: "/mnt/media/tv/".to_owned(),
//! }];
//! assert_eq!(
//!     translate_path("/mnt/media/tv/Show/S01E01.mkv", &mappings),
//!     "/tv/Show/S01E01.mkv"
//! );
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod notify;
pub mod owner;

pub use error::{NotifyError, OwnerError};
pub use notify::{
    DiscordNotifier, Notification, NotificationQueue, NotificationSender, Notifier,
    WebhookNotifier, notifiers_from_config,
};
pub use owner::{
    ArrClient, ConnectReport, ConnectionStatus, Lidarr, MediaOwner, OwnerRegistry, Radarr,
    Sonarr, translate_path,
};
