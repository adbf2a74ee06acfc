//! Radarr (movies) owner.

use async_trait::async_trait;
use camino::Utf8Path;
use mc_core::{OwnerConfig, OwnerKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::client::ArrClient;
use super::{ConnectionStatus, MediaOwner};
use crate::OwnerError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Movie {
    id: i64,
    #[serde(default)]
    path: String,
    #[serde(default)]
    has_file: bool,
    movie_file: Option<MovieFile>,
}

#[derive(Debug, Deserialize)]
struct MovieFile {
    id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoviesCommand {
    name: &'static str,
    movie_ids: [i64; 1],
}

/// A Radarr instance (API v3).
#[derive(Debug, Clone)]
pub struct Radarr {
    client: ArrClient,
}

impl Radarr {
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
impl MediaOwner for Radarr {
    fn kind(&self) -> OwnerKind {
        OwnerKind::Radarr
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

        let movies: Vec<Movie> = self.client.get("movie", &[]).await?;
        let Some((movie_id, file_id)) = movies.into_iter().find_map(|movie| {
            let file = movie.movie_file.filter(|_| movie.has_file)?;
            (!movie.path.is_empty() && translated.contains(movie.path.as_str()))
                .then_some((movie.id, file.id))
        }) else {
            return Ok(false);
        };

        self.client.delete(&format!("moviefile/{file_id}")).await?;
        // The file is gone at this point; a failed command only delays the search.
        for name in ["RefreshMovie", "MoviesSearch"] {
            let command = MoviesCommand {
                name,
                movie_ids: [movie_id],
            };
            if let Err(err) = self.client.command(&command).await {
                warn!(owner = %self.name(), command = name, error = %err, "Follow-up command failed");
            }
        }

        info!(owner = %self.name(), path = %translated, movie_id, "Requested movie reacquisition");
        Ok(true)
    }
}
