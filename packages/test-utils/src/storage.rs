//! Mock Google Cloud Storage server for testing uploads
//!
//! Provides a [`MockStorageServer`] that simulates the two JSON API endpoints
//! the uploader relies on: object metadata lookup and media upload.

use serde_json::json;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock GCS server scoped to a single bucket
///
/// # Example
///
/// ```rust,ignore
/// use multitune_test_utils::MockStorageServer;
///
/// #[tokio::test]
/// async fn test_upload() {
///     let storage = MockStorageServer::start("stems").await;
///     storage.mock_object_exists("stems/1/drums.mp3").await;
///     // ...
///     assert_eq!(storage.upload_count().await, 0);
/// }
/// ```
pub struct MockStorageServer {
    server: MockServer,
    bucket: String,
}

impl MockStorageServer {
    /// Start a new mock storage server for `bucket`
    pub async fn start(bucket: &str) -> Self {
        Self {
            server: MockServer::start().await,
            bucket: bucket.to_string(),
        }
    }

    /// Get the server URL (use as both API and public base URL)
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Public URL the uploader is expected to return for `key`
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.server.uri(), self.bucket, key)
    }

    fn metadata_path(&self, key: &str) -> String {
        format!(
            "/storage/v1/b/{}/o/{}",
            self.bucket,
            key.replace('/', "%2F")
        )
    }

    /// Mount a metadata response saying `key` already exists
    pub async fn mock_object_exists(&self, key: &str) {
        Mock::given(method("GET"))
            .and(path(self.metadata_path(key)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bucket": self.bucket,
                "name": key,
            })))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Mount a 404 metadata response for every object
    pub async fn mock_object_missing_everywhere(&self) {
        Mock::given(method("GET"))
            .and(path_regex(format!("^/storage/v1/b/{}/o/.+$", self.bucket)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "No such object"}
            })))
            .with_priority(5)
            .mount(&self.server)
            .await;
    }

    /// Mount a successful media upload for any object name
    pub async fn mock_upload_success(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/upload/storage/v1/b/{}/o", self.bucket)))
            .and(query_param("uploadType", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bucket": self.bucket,
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a failing media upload
    pub async fn mock_upload_failure(&self, status_code: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/upload/storage/v1/b/{}/o", self.bucket)))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "error": {"code": status_code, "message": "upload rejected"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of media uploads received so far
    pub async fn upload_count(&self) -> usize {
        self.uploaded_names().await.len()
    }

    /// Object names of every media upload received so far
    pub async fn uploaded_names(&self) -> Vec<String> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|r| r.method.to_string() == "POST")
            .filter_map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "name")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_object_wins_over_missing() {
        let storage = MockStorageServer::start("bucket").await;
        storage.mock_object_missing_everywhere().await;
        storage.mock_object_exists("stems/1/bass.mp3").await;

        let client = reqwest::Client::new();
        let existing = client
            .get(format!(
                "{}/storage/v1/b/bucket/o/stems%2F1%2Fbass.mp3",
                storage.url()
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(existing.status(), 200);

        let missing = client
            .get(format!(
                "{}/storage/v1/b/bucket/o/stems%2F1%2Fdrums.mp3",
                storage.url()
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_upload_count() {
        let storage = MockStorageServer::start("bucket").await;
        storage.mock_upload_success().await;

        reqwest::Client::new()
            .post(format!(
                "{}/upload/storage/v1/b/bucket/o?uploadType=media&name=a%2Fb.mp3",
                storage.url()
            ))
            .body("data")
            .send()
            .await
            .unwrap();

        assert_eq!(storage.upload_count().await, 1);
        assert_eq!(storage.uploaded_names().await, vec!["a/b.mp3".to_string()]);
    }
}
