//! Lidarr (music) owner.

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::{OwnerConfig, OwnerKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::ArrClient;
use super::{ConnectionStatus, MediaOwner};
use crate::OwnerError;

#[derive(Debug, Deserialize)]
struct Artist {
    id: i64,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Deserialize)]
struct TrackFile {
    id: i64,
    #[serde(default)]
    path: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "name")]
enum ArtistCommand<'a> {
    RescanFolders { folders: [&'a str; 1] },
    #[serde(rename_all = "camelCase")]
    RefreshArtist { artist_id: i64 },
}

/// A Lidarr instance (API v1).
#[derive(Debug, Clone)]
pub struct Lidarr {
    client: ArrClient,
}

impl Lidarr {
    /// Builds the owner from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built.
    pub fn from_config(config: &OwnerConfig) -> Result<Self, OwnerError> {
        Ok(Self {
            client: ArrClient::from_config(config, "v1")?,
        })
    }
}

#[async_trait]
impl MediaOwner for Lidarr {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Lidarr
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

        let artists: Vec<Artist> = self.client.get("artist", &[]).await?;
        let Some(artist) = artists
            .into_iter()
            .find(|a| !a.path.is_empty() && translated.contains(a.path.as_str()))
        else {
            return Ok(false);
        };

        let tracks: Vec<TrackFile> = self
            .client
            .get("trackfile", &[("artistId", artist.id.to_string())])
            .await?;
        let Some(track) = tracks.into_iter().find(|t| t.path == translated) else {
            return Ok(false);
        };

        self.client.delete(&format!("trackfile/{}", track.id)).await?;
        // The file is gone at this point; a failed command only delays the search.
        let commands = [
            ArtistCommand::RescanFolders {
                folders: [artist.path.as_str()],
            },
            ArtistCommand::RefreshArtist {
                artist_id: artist.id,
            },
        ];
        for command in &commands {
            if let Err(err) = self.client.command(command).await {
                warn!(owner = %self.name(), error = %err, "Follow-up command failed");
            }
        }

        info!(owner = %self.name(), path = %translated, artist_id = artist.id, "Requested track reacquisition");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_payloads() {
        let rescan = serde_json::to_value(ArtistCommand::RescanFolders {
            folders: ["/music/Artist"],
        })
        .unwrap();
        assert_eq!(
            rescan,
            serde_json::json!({"name": "RescanFolders", "folders": ["/music/Artist"]})
        );

        let refresh = serde_json::to_value(ArtistCommand::RefreshArtist { artist_id: 7 }).unwrap();
        assert_eq!(refresh, serde_json::json!({"name": "RefreshArtist", "artistId": 7}));
    }
}
