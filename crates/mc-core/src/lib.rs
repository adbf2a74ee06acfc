//! Core types, configuration, and content fingerprinting for mediacheck.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Error types for configuration loading and validation
//! - Configuration structures with serde defaults
//! - Domain types ([`ContentKind`], [`MediaMetadata`], [`Verdict`],
//!   [`FailureReason`], [`BadFileRecord`], [`OwnerKind`], [`EventKind`],
//!   [`StatsSnapshot`])
//! - [`ContentHash`], the sampled content fingerprint stored per healthy file
//!
//! # Crate Dependencies
//!
//! ```text
//! mc-cli ──► mc-scanner ──► mc-probe ───► mc-core
//!                      ├──► mc-store ───►
//!                      └──► mc-connect ─►
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{
    CheckConfig, Config, LoggingConfig, NotificationsConfig, NotifierConfig, NotifierKind,
    OwnerConfig, PathMapping, PolicyConfig, ProbeConfig, StoreConfig,
};
pub use error::ConfigError;
pub use hash::ContentHash;
pub use types::{
    BadFileEntry, BadFileRecord, CodecType, ContentKind, EventKind, FailureReason,
    MediaMetadata, MediaStream, OwnerKind, StatsSnapshot, Verdict,
};
