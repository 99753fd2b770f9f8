//! Core API client implementation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{CoreApiError, CoreApiResult};
use crate::models::{QuizAudioUpdate, Track, TrackQuizAudio};

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// Core API client
#[derive(Clone)]
pub struct CoreApiClient {
    http_client: Client,
    root_url: String,
    token: String,
    max_retries: u32,
}

impl fmt::Debug for CoreApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreApiClient")
            .field("root_url", &self.root_url)
            .field("token", &"[REDACTED]")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl CoreApiClient {
    /// Create a new client for the API rooted at `root_url`
    ///
    /// # Errors
    /// Returns `CoreApiError::MissingToken` if the token is empty
    pub fn new(root_url: impl Into<String>, token: impl Into<String>) -> CoreApiResult<Self> {
        Self::with_timeout(root_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(
        root_url: impl Into<String>,
        token: impl Into<String>,
        timeout_secs: u64,
    ) -> CoreApiResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreApiError::MissingToken);
        }

        let root_url = root_url.into().trim_end_matches('/').to_string();
        if root_url.is_empty() {
            return Err(CoreApiError::InvalidInput(
                "root URL cannot be empty".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .user_agent("Multitune-AudioProcessor/1.0")
            .build()?;

        Ok(Self {
            http_client,
            root_url,
            token,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Override the number of retries for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.root_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> CoreApiResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CoreApiResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Core API request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a request, mapping transport failures and error statuses
    async fn send(
        &self,
        builder: RequestBuilder,
        resource: &'static str,
        id: i64,
    ) -> CoreApiResult<Response> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            if e.is_timeout() {
                CoreApiError::Timeout
            } else {
                CoreApiError::Http(e)
            }
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(CoreApiError::NotFound { resource, id }),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(CoreApiError::Unauthorized(status.as_u16()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(CoreApiError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &'static str,
        id: i64,
    ) -> CoreApiResult<T> {
        let url = self.endpoint(path);
        let text = self
            .with_retry(|| async {
                let response = self.send(self.http_client.get(&url), resource, id).await?;
                response.text().await.map_err(CoreApiError::Http)
            })
            .await?;

        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch a track and its audio source
    ///
    /// # Errors
    /// - `CoreApiError::NotFound` - If the track does not exist
    /// - `CoreApiError::Unauthorized` - If the token is rejected
    /// - `CoreApiError::Http` - If the HTTP request fails
    #[instrument(skip(self))]
    pub async fn get_track(&self, track_id: i64) -> CoreApiResult<Track> {
        debug!(track_id, "Fetching track from core API");
        self.get_json(&format!("tracks/{}", track_id), "track", track_id)
            .await
    }

    /// Fetch a quiz audio with its per-stem start times
    #[instrument(skip(self))]
    pub async fn get_track_quiz_audio(&self, quiz_audio_id: i64) -> CoreApiResult<TrackQuizAudio> {
        debug!(quiz_audio_id, "Fetching track quiz audio from core API");
        self.get_json(
            &format!("trackaudios/{}", quiz_audio_id),
            "track quiz audio",
            quiz_audio_id,
        )
        .await
    }

    /// Update a quiz audio (used to mark it prepared with its render URL)
    #[instrument(skip(self, update))]
    pub async fn update_quiz_audio(
        &self,
        quiz_audio_id: i64,
        update: &QuizAudioUpdate,
    ) -> CoreApiResult<()> {
        let url = self.endpoint(&format!("trackaudios/{}", quiz_audio_id));

        self.with_retry(|| async {
            self.send(
                self.http_client.put(&url).json(update),
                "track quiz audio",
                quiz_audio_id,
            )
            .await
            .map(|_| ())
        })
        .await?;

        debug!(quiz_audio_id, prepared = update.prepared, "Quiz audio updated");
        Ok(())
    }
}

/// Backoff before retry number `attempt`
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(attempt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_saturates() {
        assert_eq!(retry_delay(1), Duration::from_millis(200));
        assert_eq!(retry_delay(3), Duration::from_millis(800));
        assert_eq!(retry_delay(64), Duration::from_millis(u64::MAX));
        assert_eq!(retry_delay(u32::MAX), Duration::from_millis(u64::MAX));
    }
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_requires_token() {
        let result = CoreApiClient::new("http://core", "  ");
        assert_matches!(result, Err(CoreApiError::MissingToken));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = CoreApiClient::new("http://core/", "very-secret").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("http://core"));
    }

    #[tokio::test]
    async fn test_get_track_quiz_audio_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/trackaudios/7"))
            .and(bearer_token("jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "trackId": "42",
                "quizAudioStartTimes": [{"stem": "bass", "startTime": 3}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CoreApiClient::new(server.uri(), "jwt").unwrap();
        let audio = client.get_track_quiz_audio(7).await.unwrap();
        assert_eq!(audio.track_id, 42);
        assert_eq!(audio.stem_timings()["bass"], 3.0);
    }

    #[tokio::test]
    async fn test_missing_track_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tracks/5"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = CoreApiClient::new(server.uri(), "jwt").unwrap();
        let err = client.get_track(5).await.unwrap_err();
        assert_matches!(err, CoreApiError::NotFound { resource: "track", id: 5 });
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tracks/1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(3)
            .mount(&server)
            .await;

        let client = CoreApiClient::new(server.uri(), "jwt")
            .unwrap()
            .with_max_retries(2);
        let err = client.get_track(1).await.unwrap_err();
        assert_matches!(err, CoreApiError::Api { status: 502, .. });
    }

    #[tokio::test]
    async fn test_update_quiz_audio_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/trackaudios/7"))
            .and(bearer_token("jwt"))
            .and(body_json(json!({"prepared": true, "audioUrl": "https://cdn/m.mp3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let client = CoreApiClient::new(server.uri(), "jwt").unwrap();
        client
            .update_quiz_audio(7, &QuizAudioUpdate::prepared("https://cdn/m.mp3"))
            .await
            .unwrap();
    }
}
