//! Ingress job message

use serde::Deserialize;

use crate::error::{WorkerError, WorkerResult};

/// A request to separate one track, as published on the job channel
///
/// Wire format: `{"jobId": "...", "trackId": 42, "preview": "https://..."}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_id: String,
    pub track_id: i64,
    #[serde(rename = "preview")]
    pub source_url: String,
}

impl JobRequest {
    /// Decode and validate a raw channel payload
    pub fn decode(payload: &str) -> WorkerResult<Self> {
        let request: JobRequest = serde_json::from_str(payload)?;

        if request.job_id.trim().is_empty() {
            return Err(WorkerError::Decode("jobId cannot be empty".to_string()));
        }

        let url = url::Url::parse(request.source_url.trim())
            .map_err(|e| WorkerError::Decode(format!("preview is not a URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(WorkerError::Decode(format!(
                "unsupported preview scheme '{}'",
                url.scheme()
            )));
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_decode_valid_message() {
        let request =
            JobRequest::decode(r#"{"jobId":"j1","trackId":42,"preview":"http://x/a.mp3"}"#)
                .unwrap();
        assert_eq!(request.job_id, "j1");
        assert_eq!(request.track_id, 42);
        assert_eq!(request.source_url, "http://x/a.mp3");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let request = JobRequest::decode(
            r#"{"jobId":"j1","trackId":1,"preview":"https://x/a.mp3","priority":"high"}"#,
        )
        .unwrap();
        assert_eq!(request.track_id, 1);
    }

    #[test]
    fn test_decode_rejects_missing_track_id() {
        let err = JobRequest::decode(r#"{"jobId":"j2","preview":"http://x"}"#).unwrap_err();
        assert_matches!(err, WorkerError::Decode(_));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert_matches!(JobRequest::decode("not json"), Err(WorkerError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_empty_job_id() {
        let err = JobRequest::decode(r#"{"jobId":" ","trackId":1,"preview":"http://x/a.mp3"}"#)
            .unwrap_err();
        assert_matches!(err, WorkerError::Decode(_));
    }

    #[test]
    fn test_decode_rejects_bad_preview() {
        assert!(JobRequest::decode(r#"{"jobId":"j","trackId":1,"preview":""}"#).is_err());
        assert!(JobRequest::decode(r#"{"jobId":"j","trackId":1,"preview":"ftp://x/a"}"#).is_err());
    }
}
