//! Object storage for stems and quiz renders
//!
//! Uploads go through the Google Cloud Storage JSON API. An object that
//! already exists is never re-uploaded, so re-running a job is cheap.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use multitune_shared_config::StorageConfig;
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::error::{WorkerError, WorkerResult};

/// Blob storage for finished artifacts
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload `path` to `key` unless an object is already there; returns
    /// the object's public URL either way
    async fn upload_if_absent(&self, key: &str, path: &Path) -> WorkerResult<String>;

    /// Public URL for `key`
    fn public_url(&self, key: &str) -> String;
}

/// Google Cloud Storage adapter
#[derive(Debug, Clone)]
pub struct GcsStorage {
    http_client: Client,
    config: StorageConfig,
}

impl GcsStorage {
    pub fn new(config: StorageConfig) -> WorkerResult<Self> {
        Url::parse(&config.api_url)
            .map_err(|e| WorkerError::Configuration(format!("GCS_BASE_URL: {}", e)))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Multitune-AudioProcessor/1.0")
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn api_url(&self, segments: &[&str]) -> WorkerResult<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| WorkerError::Configuration(format!("GCS_BASE_URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| WorkerError::Configuration("GCS_BASE_URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Metadata URL; the key is one path segment, so `/` is encoded
    fn object_url(&self, key: &str) -> WorkerResult<Url> {
        self.api_url(&["storage", "v1", "b", &self.config.bucket, "o", key])
    }

    fn upload_url(&self, key: &str) -> WorkerResult<Url> {
        let mut url = self.api_url(&["upload", "storage", "v1", "b", &self.config.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.access_token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Whether an object exists at `key`
    pub async fn exists(&self, key: &str) -> WorkerResult<bool> {
        let response = self
            .authorized(self.http_client.get(self.object_url(key)?))
            .send()
            .await
            .map_err(|e| WorkerError::upload(key, e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(WorkerError::upload(
                key,
                format!("existence check returned {}", status.as_u16()),
            )),
        }
    }
}

#[async_trait]
impl ObjectStorage for GcsStorage {
    async fn upload_if_absent(&self, key: &str, path: &Path) -> WorkerResult<String> {
        let public_url = self.public_url(key);

        if self.exists(key).await? {
            debug!(key, "Object already stored, skipping upload");
            return Ok(public_url);
        }

        let body = tokio::fs::read(path).await?;
        let size = body.len();
        let response = self
            .authorized(self.http_client.post(self.upload_url(key)?))
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .body(body)
            .send()
            .await
            .map_err(|e| WorkerError::upload(key, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(WorkerError::upload(
                key,
                format!("status {}: {}", status.as_u16(), text.trim()),
            ));
        }

        info!(key, bytes = size, "Uploaded object");
        Ok(public_url)
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }
}
