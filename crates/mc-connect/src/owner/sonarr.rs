//! Sonarr (TV series) owner.

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::{OwnerConfig, OwnerKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::ArrClient;
use super::{ConnectionStatus, MediaOwner};
use crate::OwnerError;

#[derive(Debug, Deserialize)]
struct Series {
    id: i64,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct EpisodeFile {
    id: i64,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesCommand {
    name: &'static str,
    series_id: i64,
}

/// A Sonarr instance (API v3).
#[derive(Debug, Clone)]
pub struct Sonarr {
    client: ArrClient,
}

impl Sonarr {
    /// Builds the owner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn from_config(config: &OwnerConfig) -> Result<Self, OwnerError> {
        Ok(Self {
            client: ArrClient::from_config(config, "v3")?,
        })
    }
}

#[async_trait]
impl MediaOwner for Sonarr {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Sonarr
    }

    fn name(&self) -> &str {
        self.client.name()
    }

    async fn connect(&self) -> Result<ConnectionStatus, OwnerError> {
        self.client.system_status().await
    }

    async fn claims(&self, path: &Utf8Path) -> Result<bool, OwnerError> {
        self.client.under_root_folder(path).await
    }

    async fn remove_and_research(&self, path: &Utf8Path) -> Result<bool, OwnerError> {
        let translated = self.client.translate(path);

        let series: Vec<Series> = self.client.get("series", &[]).await?;
        let Some(series) = series
            .into_iter()
            .find(|s| !s.path.is_empty() && translated.contains(s.path.as_str()))
        else {
            return Ok(false);
        };

        let files: Vec<EpisodeFile> = self
            .client
            .get("episodefile", &[("seriesId", series.id.to_string())])
            .await?;
        let Some(file) = files.into_iter().find(|f| f.path == translated) else {
            return Ok(false);
        };

        self.client.delete(&format!("episodefile/{}", file.id)).await?;
        // The file is gone at this point; a failed command only delays the search.
        for name in ["RescanSeries", "SeriesSearch"] {
            let command = SeriesCommand {
                name,
                series_id: series.id,
            };
            if let Err(err) = self.client.command(&command).await {
                warn!(owner = %self.name(), command = name, error = %err, "Follow-up command failed");
            }
        }

        info!(owner = %self.name(), path = %translated, series_id = series.id, "Requested episode reacquisition");
        Ok(true)
    }
}
