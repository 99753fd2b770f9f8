//! Core API response and request models

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A track as returned by `GET /api/tracks/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Track ID (a bigint column, serialized as a string by the API)
    #[serde(deserialize_with = "flexible_i64")]
    pub id: i64,
    /// Track title
    pub title: String,
    /// Artist display name
    pub artist: String,
    /// Stored preview URL, if any
    #[serde(default)]
    pub preview: Option<String>,
    /// Where the audio comes from
    #[serde(default)]
    pub track_source: Option<TrackSource>,
}

/// The upstream provider a track's audio is fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSource {
    /// Provider name (e.g. `deezer`)
    pub source: String,
    /// Provider-specific track ID
    #[serde(default)]
    pub source_id: Option<String>,
    /// Provider page URL
    #[serde(default)]
    pub url: Option<String>,
}

/// A quiz audio as returned by `GET /api/trackaudios/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuizAudio {
    pub id: i64,
    #[serde(deserialize_with = "flexible_i64")]
    pub track_id: i64,
    #[serde(default)]
    pub prepared: bool,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub audio_treatment_version: Option<i32>,
    #[serde(default)]
    pub quiz_audio_start_times: Vec<QuizAudioStartTime>,
}

impl TrackQuizAudio {
    /// Stem name → start time in seconds
    pub fn stem_timings(&self) -> BTreeMap<String, f64> {
        self.quiz_audio_start_times
            .iter()
            .map(|t| (t.stem.clone(), t.start_time))
            .collect()
    }
}

/// When a stem becomes audible in the quiz render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAudioStartTime {
    /// Stem name (drums, vocals, guitar, bass, piano, other)
    pub stem: String,
    /// Offset in seconds
    pub start_time: f64,
}

/// Body of `PUT /api/trackaudios/{id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAudioUpdate {
    pub prepared: bool,
    pub audio_url: String,
}

impl QuizAudioUpdate {
    /// Mark the quiz audio as prepared with its final render URL
    pub fn prepared(audio_url: impl Into<String>) -> Self {
        Self {
            prepared: true,
            audio_url: audio_url.into(),
        }
    }
}

/// Accept an integer either as a JSON number or as a numeric string
fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
