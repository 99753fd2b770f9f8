//! Multitune core API client
//!
//! Thin client over the core API endpoints the audio processor consumes:
//! - `GET /api/tracks/{id}`: track metadata and its audio source
//! - `GET /api/trackaudios/{id}`: a quiz audio and its stem start times
//! - `PUT /api/trackaudios/{id}`: mark a quiz audio as prepared
//!
//! Every request carries the caller's bearer token.
//!
//! # Example
//!
//! ```rust,no_run
//! use multitune_core_api_client::{CoreApiClient, QuizAudioUpdate};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CoreApiClient::new("http://localhost:3000", "jwt-token")?;
//!
//! let quiz_audio = client.get_track_quiz_audio(7).await?;
//! let track = client.get_track(quiz_audio.track_id).await?;
//! println!("{} - {}", track.artist, track.title);
//!
//! client
//!     .update_quiz_audio(7, &QuizAudioUpdate::prepared("https://cdn/merged.mp3"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::CoreApiClient;
pub use error::{CoreApiError, CoreApiResult};
pub use models::{QuizAudioStartTime, QuizAudioUpdate, Track, TrackQuizAudio, TrackSource};
