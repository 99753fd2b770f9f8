//! Mock audio host for testing downloads and preview resolution
//!
//! Provides a [`MockPreviewServer`] that serves preview audio bytes and a
//! Deezer-style `/track/{id}` metadata endpoint pointing at them.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tiny fake MP3 payload (an ID3 header followed by padding)
pub const FAKE_MP3: &[u8] = b"ID3\x03\x00\x00\x00\x00\x00\x00fake-audio-payload";

/// Mock preview host
pub struct MockPreviewServer {
    server: MockServer,
}

impl MockPreviewServer {
    /// Start a new mock preview host
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// URL of a preview file served at `file_path`
    pub fn preview_url(&self, file_path: &str) -> String {
        format!("{}/{}", self.server.uri(), file_path.trim_start_matches('/'))
    }

    /// Serve [`FAKE_MP3`] at `file_path`
    pub async fn mock_preview(&self, file_path: &str) {
        self.mock_preview_bytes(file_path, FAKE_MP3.to_vec()).await;
    }

    /// Serve custom bytes at `file_path`
    pub async fn mock_preview_bytes(&self, file_path: &str, bytes: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", file_path.trim_start_matches('/'))))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(bytes),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail requests for `file_path` with `status_code`
    pub async fn mock_preview_failure(&self, file_path: &str, status_code: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", file_path.trim_start_matches('/'))))
            .respond_with(ResponseTemplate::new(status_code))
            .mount(&self.server)
            .await;
    }

    /// Serve Deezer-style track metadata whose `preview` points at `file_path`
    pub async fn mock_deezer_track(&self, deezer_id: &str, file_path: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/track/{}", deezer_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": deezer_id,
                "title": "Test Title",
                "preview": self.preview_url(file_path)
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve Deezer-style track metadata without a preview
    pub async fn mock_deezer_track_without_preview(&self, deezer_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/track/{}", deezer_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"type": "DataException", "message": "no data", "code": 800}
            })))
            .mount(&self.server)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_preview_served() {
        let host = MockPreviewServer::start().await;
        host.mock_preview("previews/a.mp3").await;

        let bytes = reqwest::get(host.preview_url("previews/a.mp3"))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        assert_eq!(&bytes[..], FAKE_MP3);
    }
}
