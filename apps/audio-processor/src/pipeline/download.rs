//! Source audio download

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Streams remote audio files to local disk
#[derive(Debug, Clone)]
pub struct Downloader {
    http_client: Client,
}

impl Downloader {
    pub fn new() -> WorkerResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent("Multitune-AudioProcessor/1.0")
            .build()?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Download `url` into `target`, returning the number of bytes written
    ///
    /// Non-2xx responses and empty bodies are `Download` errors.
    pub async fn download(&self, url: &str, target: &Path) -> WorkerResult<u64> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::download(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::download(url, format!("status {}", status.as_u16())));
        }

        let mut file = tokio::fs::File::create(target).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| WorkerError::download(url, e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(WorkerError::download(url, "empty response body"));
        }

        debug!(url, bytes = written, "Downloaded source audio");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_writes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 2048]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("input.mp3");
        let written = Downloader::new()
            .unwrap()
            .download(&format!("{}/a.mp3", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(written, 2048);
        assert_eq!(std::fs::read(&target).unwrap().len(), 2048);
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = Downloader::new()
            .unwrap()
            .download(&format!("{}/gone.mp3", server.uri()), &dir.path().join("x"))
            .await
            .unwrap_err();

        assert_matches!(err, WorkerError::Download { ref reason, .. } if reason == "status 404");
    }

    #[tokio::test]
    async fn test_download_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = Downloader::new()
            .unwrap()
            .download(&server.uri(), &dir.path().join("x"))
            .await;
        assert_matches!(result, Err(WorkerError::Download { .. }));
    }
}
