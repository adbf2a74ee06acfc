//! Shared HTTP plumbing for the *arr family of media managers.
//!
//! Sonarr, Radarr and Lidarr expose the same API shape: an `X-Api-Key`
//! header, a versioned `/api/{v}` prefix, `system/status`, `rootfolder` and a
//! `command` endpoint. [`ArrClient`] wraps that shape once.

use std::borrow::Cow;
use std::time::Duration;

use camino::Utf8Path;
use mc_core::{OwnerConfig, PathMapping};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ConnectionStatus;
use crate::OwnerError;

/// Per-request timeout for media-manager calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SystemStatus {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
struct RootFolder {
    path: String,
}

/// A *arr API client bound to one configured instance.
#[derive(Debug, Clone)]
pub struct ArrClient {
    name: String,
    http: Client,
    api_base: String,
    api_key: String,
    mappings: Vec<PathMapping>,
}

impl ArrClient {
    /// Builds a client for `config` using API version `api_version` (`v3`, `v1`).
    ///
    /// # Errors
    ///
    /// Returns [`OwnerError::Config`] for an empty API key, or
    /// [`OwnerError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &OwnerConfig, api_version: &str) -> Result<Self, OwnerError> {
        let name = config.display_name().to_owned();
        if config.api_key.is_empty() {
            return Err(OwnerError::config(name, "api key is empty"));
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("mediacheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| OwnerError::Client {
                owner: name.clone(),
                source,
            })?;

        Ok(Self {
            api_base: format!("{}/api/{api_version}", config.base_url()),
            api_key: config.api_key.clone(),
            mappings: config.mappings.clone(),
            http,
            name,
        })
    }

    /// Returns the owner name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rewrites a scanner-side path into this manager's namespace.
    #[must_use]
    pub fn translate<'a>(&self, path: &'a Utf8Path) -> Cow<'a, str> {
        translate_path(path.as_str(), &self.mappings)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.api_base)
    }

    /// Sends a GET request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerError::Request`] on transport failure, an error status
    /// or an undecodable body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, OwnerError> {
        debug!(owner = %self.name, endpoint, "GET");
        self.http
            .get(self.url(endpoint))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| OwnerError::request(&self.name, endpoint, source))?
            .json()
            .await
            .map_err(|source| OwnerError::request(&self.name, endpoint, source))
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerError::Request`] on transport failure or an error status.
    pub async fn delete(&self, endpoint: &str) -> Result<(), OwnerError> {
        debug!(owner = %self.name, endpoint, "DELETE");
        self.http
            .delete(self.url(endpoint))
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| OwnerError::request(&self.name, endpoint, source))?;
        Ok(())
    }

    /// Queues a named command.
    ///
    /// # Errors
    ///
    /// Returns [`OwnerError::Request`] on transport failure or an error status.
    pub async fn command<B: Serialize + Sync>(&self, body: &B) -> Result<(), OwnerError> {
        self.http
            .post(self.url("command"))
            .header("X-Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| OwnerError::request(&self.name, "command", source))?;
        Ok(())
    }

    /// Checks connectivity through the `system/status` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or no version is reported.
    pub async fn system_status(&self) -> Result<ConnectionStatus, OwnerError> {
        let status: SystemStatus = self.get("system/status", &[]).await?;
        if status.version.is_empty() {
            return Err(OwnerError::NoVersion {
                owner: self.name.clone(),
            });
        }
        Ok(ConnectionStatus {
            version: status.version,
        })
    }

    /// Returns `true` if the translated path lies under one of the manager's
    /// root folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the root folders cannot be fetched.
    pub async fn under_root_folder(&self, path: &Utf8Path) -> Result<bool, OwnerError> {
        let folders: Vec<RootFolder> = self.get("rootfolder", &[]).await?;
        let translated = self.translate(path);
        Ok(folders
            .iter()
            .any(|folder| !folder.path.is_empty() && translated.contains(folder.path.as_str())))
    }
}

/// Rewrites `path` with the first mapping whose local prefix occurs in it.
///
/// Only the first occurrence of that prefix is replaced with the manager-side
/// prefix. Without a matching mapping the path is returned unchanged.
///
/// # Examples
///
/// ```
/// use mc_connect::translate_path;
/// use mc_core::PathMapping;
///
/// let mappings = vec![PathMapping {
///     manager: "/tv/".to_owned(),
///     local: "/mnt/media/tv/".to_owned(),
/// }];
///
/// assert_eq!(translate_path("/mnt/media/tv/Show/S01E01.mkv", &mappings), "/tv/Show/S01E01.mkv");
/// assert_eq!(translate_path("/downloads/x.mkv", &mappings), "/downloads/x.mkv");
/// ```
#[must_use]
pub fn translate_path<'a>(path: &'a str, mappings: &[PathMapping]) -> Cow<'a, str> {
    mappings
        .iter()
        .find(|mapping| !mapping.local.is_empty() && path.contains(mapping.local.as_str()))
        .map_or(Cow::Borrowed(path), |mapping| {
            Cow::Owned(path.replacen(mapping.local.as_str(), &mapping.manager, 1))
        })
}
