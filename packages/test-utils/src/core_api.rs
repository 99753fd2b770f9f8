//! Mock core API server for testing the quiz audio flow
//!
//! Provides a [`MockCoreApiServer`] that simulates the track and quiz audio
//! endpoints, including bearer token checks.

use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock core API server
///
/// # Example
///
/// ```rust,ignore
/// use multitune_test_utils::{MockCoreApiServer, QuizAudioFixture};
///
/// #[tokio::test]
/// async fn test_quiz_flow() {
///     let core = MockCoreApiServer::start().await;
///     core.mock_quiz_audio(QuizAudioFixture::new(7, 42).start("drums", 0)).await;
///     core.mock_deezer_track(42, "3135556").await;
/// }
/// ```
pub struct MockCoreApiServer {
    server: MockServer,
    token: String,
}

impl MockCoreApiServer {
    /// Start a new mock core API expecting the default token
    pub async fn start() -> Self {
        Self::start_with_token("test-jwt").await
    }

    /// Start a new mock core API expecting `token`
    pub async fn start_with_token(token: &str) -> Self {
        Self {
            server: MockServer::start().await,
            token: token.to_string(),
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get the expected bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Mount a quiz audio response
    pub async fn mock_quiz_audio(&self, fixture: QuizAudioFixture) {
        Mock::given(method("GET"))
            .and(path(format!("/api/trackaudios/{}", fixture.id)))
            .and(bearer_token(self.token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture.to_json()))
            .mount(&self.server)
            .await;
    }

    /// Mount a track whose audio comes from Deezer
    pub async fn mock_deezer_track(&self, track_id: i64, deezer_id: &str) {
        self.mock_track_with_source(track_id, "deezer", deezer_id)
            .await;
    }

    /// Mount a track with an arbitrary source
    pub async fn mock_track_with_source(&self, track_id: i64, source: &str, source_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/tracks/{}", track_id)))
            .and(bearer_token(self.token.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": track_id.to_string(),
                "title": "Test Title",
                "artist": "Test Artist",
                "trackSource": {"source": source, "sourceId": source_id}
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful "prepared" update for a quiz audio
    pub async fn mock_mark_prepared(&self, quiz_audio_id: i64) {
        Mock::given(method("PUT"))
            .and(path(format!("/api/trackaudios/{}", quiz_audio_id)))
            .and(bearer_token(self.token.as_str()))
            .and(body_partial_json(json!({"prepared": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": quiz_audio_id,
                "prepared": true
            })))
            .mount(&self.server)
            .await;
    }

    /// `audioUrl` values received by PUT requests so far
    pub async fn prepared_urls(&self) -> Vec<String> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|r| r.method.to_string() == "PUT")
            .filter_map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).ok())
            .filter_map(|v| v.get("audioUrl").and_then(|u| u.as_str()).map(String::from))
            .collect()
    }
}

/// Quiz audio fixture with builder-style start times
#[derive(Debug, Clone)]
pub struct QuizAudioFixture {
    pub id: i64,
    pub track_id: i64,
    pub start_times: Vec<(String, f64)>,
}

impl QuizAudioFixture {
    /// A quiz audio for `track_id` without start times
    pub fn new(id: i64, track_id: i64) -> Self {
        Self {
            id,
            track_id,
            start_times: Vec::new(),
        }
    }

    /// Add a stem start time (seconds)
    pub fn start(mut self, stem: &str, seconds: f64) -> Self {
        self.start_times.push((stem.to_string(), seconds));
        self
    }

    /// Convert to the JSON shape the core API returns
    pub fn to_json(&self) -> serde_json::Value {
        let times: Vec<serde_json::Value> = self
            .start_times
            .iter()
            .map(|(stem, start)| {
                json!({
                    "trackQuizAudioId": self.id,
                    "stem": stem,
                    "startTime": start
                })
            })
            .collect();

        json!({
            "id": self.id,
            "trackId": self.track_id.to_string(),
            "prepared": false,
            "audioUrl": "",
            "audioTreatmentVersion": 1,
            "quizAudioStartTimes": times
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_json() {
        let json = QuizAudioFixture::new(7, 42)
            .start("drums", 0.0)
            .start("vocals", 10.0)
            .to_json();
        assert_eq!(json["trackId"], "42");
        assert_eq!(json["quizAudioStartTimes"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bearer_token_required() {
        let core = MockCoreApiServer::start().await;
        core.mock_deezer_track(42, "99").await;

        let client = reqwest::Client::new();
        let denied = client
            .get(format!("{}/api/tracks/42", core.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), 404);

        let allowed = client
            .get(format!("{}/api/tracks/42", core.url()))
            .bearer_auth(core.token())
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), 200);
    }
}
