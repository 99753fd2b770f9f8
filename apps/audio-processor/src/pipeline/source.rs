//! Track audio source resolution

use std::time::Duration;

use multitune_core_api_client::Track;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Deserialize)]
struct DeezerTrack {
    #[serde(default)]
    preview: Option<String>,
}

/// Resolves a track's playable preview URL from its upstream provider
#[derive(Debug, Clone)]
pub struct SourceResolver {
    http_client: Client,
    deezer_api_url: String,
}

impl SourceResolver {
    pub fn new(deezer_api_url: impl Into<String>) -> WorkerResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Multitune-AudioProcessor/1.0")
            .build()?;
        Ok(Self {
            http_client,
            deezer_api_url: deezer_api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Preview URL for a track
    ///
    /// Only Deezer-sourced tracks are supported.
    pub async fn resolve(&self, track: &Track) -> WorkerResult<String> {
        let source = track.track_source.as_ref().ok_or_else(|| {
            WorkerError::UnsupportedSource(format!("track {} has no source", track.id))
        })?;

        match source.source.to_lowercase().as_str() {
            "deezer" => {
                let source_id = source
                    .source_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        WorkerError::UnsupportedSource(format!(
                            "track {} has no deezer id",
                            track.id
                        ))
                    })?;
                self.deezer_preview(source_id).await
            }
            other => Err(WorkerError::UnsupportedSource(other.to_string())),
        }
    }

    async fn deezer_preview(&self, deezer_id: &str) -> WorkerResult<String> {
        let url = format!("{}/track/{}", self.deezer_api_url, deezer_id);
        debug!(%url, "Resolving Deezer preview");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::download(&url, e.to_string()))?;
        if !response.status().is_success() {
            return Err(WorkerError::download(
                &url,
                format!("status {}", response.status().as_u16()),
            ));
        }

        // Deezer reports missing tracks as 200 with an error body
        let track: DeezerTrack = response.json().await?;
        track
            .preview
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| WorkerError::download(&url, "track has no preview"))
    }
}
