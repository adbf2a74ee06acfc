//! Media owners: external managers that can replace a bad file.
//!
//! # Module Organization
//!
//! - [`client`] - Shared *arr HTTP client and path translation
//! - [`sonarr`], [`radarr`], [`lidarr`] - The three owner variants
//!
//! The scanner only sees the [`MediaOwner`] trait and an [`OwnerRegistry`]
//! holding owners in dispatch order.

pub mod client;
pub mod lidarr;
pub mod radarr;
pub mod sonarr;

use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8Path;
use futures_util::future::join_all;
use mc_core::{OwnerConfig, OwnerKind};
use tracing::{info, warn};

use crate::OwnerError;

pub use client::{ArrClient, translate_path};
pub use lidarr::Lidarr;
pub use radarr::Radarr;
pub use sonarr::Sonarr;

/// Result of a successful connectivity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Version string reported by the service.
    pub version: String,
}

/// An external service responsible for part of the library.
#[async_trait]
pub trait MediaOwner: Send + Sync {
    /// Which service family this owner belongs to.
    fn kind(&self) -> OwnerKind;

    /// Display name for logs.
    fn name(&self) -> &str;

    /// Checks that the service is reachable and authenticated.
    async fn connect(&self) -> Result<ConnectionStatus, OwnerError>;

    /// Returns `true` if `path` falls under one of the owner's managed roots.
    async fn claims(&self, path: &Utf8Path) -> Result<bool, OwnerError>;

    /// Deletes the file for `path` on the manager side and triggers a rescan
    /// and search.
    ///
    /// Returns `Ok(false)` when the manager has nothing to delete for the
    /// path. Once the delete succeeds the result is `Ok(true)`, even if the
    /// follow-up rescan or search commands fail.
    async fn remove_and_research(&self, path: &Utf8Path) -> Result<bool, OwnerError>;
}

/// Outcome of connecting one configured owner.
#[derive(Debug)]
pub struct ConnectReport {
    /// Owner name.
    pub name: String,
    /// Owner kind.
    pub kind: OwnerKind,
    /// Connection result.
    pub result: Result<ConnectionStatus, OwnerError>,
}

/// The configured owners, in dispatch order.
///
/// Dispatch order is Sonarr owners, then Radarr, then Lidarr; within one
/// kind, declaration order.
#[derive(Clone, Default)]
pub struct OwnerRegistry {
    owners: Vec<Arc<dyn MediaOwner>>,
}

impl std::fmt::Debug for OwnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.owners.iter().map(|o| (o.kind(), o.name().to_owned())))
            .finish()
    }
}

impl OwnerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds owners for every configured service with `process` enabled.
    ///
    /// # Errors
    ///
    /// Returns the first client construction error.
    pub fn from_config(configs: &[OwnerConfig]) -> Result<Self, OwnerError> {
        let mut registry = Self::new();
        for config in configs {
            if !config.process {
                info!(owner = %config.display_name(), "Owner disabled; files it manages will not be fixed");
                continue;
            }
            let owner: Arc<dyn MediaOwner> = match config.service {
                OwnerKind::Sonarr => Arc::new(Sonarr::from_config(config)?),
                OwnerKind::Radarr => Arc::new(Radarr::from_config(config)?),
                OwnerKind::Lidarr => Arc::new(Lidarr::from_config(config)?),
                OwnerKind::Unknown => {
                    return Err(OwnerError::config(config.display_name(), "unknown service"));
                }
            };
            registry.push(owner);
        }
        Ok(registry)
    }

    /// Adds an owner, keeping dispatch order.
    pub fn push(&mut self, owner: Arc<dyn MediaOwner>) {
        let kind = owner.kind();
        let position = self.owners.partition_point(|o| o.kind() <= kind);
        self.owners.insert(position, owner);
    }

    /// Adds an owner, builder style.
    #[must_use]
    pub fn with_owner(mut self, owner: Arc<dyn MediaOwner>) -> Self {
        self.push(owner);
        self
    }

    /// Iterates owners in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn MediaOwner>> {
        self.owners.iter()
    }

    /// Returns the number of owners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Returns `true` if no owners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Connects every owner concurrently and drops the ones that fail.
    ///
    /// Returns one report per owner, in dispatch order.
    pub async fn connect_all(&mut self) -> Vec<ConnectReport> {
        let results = join_all(self.owners.iter().map(|owner| owner.connect())).await;

        let mut reports = Vec::with_capacity(results.len());
        let mut connected = Vec::with_capacity(results.len());
        for (owner, result) in self.owners.drain(..).zip(results) {
            match &result {
                Ok(status) => {
                    info!(owner = %owner.name(), kind = owner.kind().as_str(), version = %status.version, "Connected");
                    connected.push(Arc::clone(&owner));
                }
                Err(err) => {
                    warn!(owner = %owner.name(), kind = owner.kind().as_str(), error = %err, "Connection failed; owner disabled for this process");
                }
            }
            reports.push(ConnectReport {
                name: owner.name().to_owned(),
                kind: owner.kind(),
                result,
            });
        }
        self.owners = connected;
        reports
    }
}
