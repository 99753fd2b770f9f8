//! Quiz audio preparation
//!
//! Fetches the quiz audio's per-stem start times from the core API, renders
//! the staggered mix and reports the render URL back.

use std::sync::Arc;

use multitune_core_api_client::{CoreApiClient, QuizAudioUpdate};
use tracing::{info, instrument};

use super::{
    download_and_separate, scratch_dir, Downloader, LoggingProgress, ObjectStorage, Separator,
    SourceResolver, StemMixer, TimedStem,
};
use crate::error::{WorkerError, WorkerResult};

/// File name of the final quiz render
pub const QUIZ_RENDER_NAME: &str = "merged.mp3";

/// Object key of a track's quiz render
pub fn quiz_render_key(track_id: i64) -> String {
    format!("audios/{}/{}", track_id, QUIZ_RENDER_NAME)
}

pub struct QuizAudioPipeline {
    core_api: CoreApiClient,
    resolver: SourceResolver,
    downloader: Downloader,
    separator: Arc<dyn Separator>,
    mixer: Arc<dyn StemMixer>,
    storage: Arc<dyn ObjectStorage>,
    model: String,
}

impl QuizAudioPipeline {
    pub fn new(
        core_api: CoreApiClient,
        resolver: SourceResolver,
        downloader: Downloader,
        separator: Arc<dyn Separator>,
        mixer: Arc<dyn StemMixer>,
        storage: Arc<dyn ObjectStorage>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            core_api,
            resolver,
            downloader,
            separator,
            mixer,
            storage,
            model: model.into(),
        }
    }

    /// Prepare one quiz audio end to end; returns the render URL
    #[instrument(skip(self))]
    pub async fn prepare(&self, quiz_audio_id: i64) -> WorkerResult<String> {
        let quiz_audio = self.core_api.get_track_quiz_audio(quiz_audio_id).await?;
        let timings = quiz_audio.stem_timings();
        if timings.is_empty() {
            return Err(WorkerError::Mixing(format!(
                "quiz audio {} has no stem start times",
                quiz_audio_id
            )));
        }

        let track = self.core_api.get_track(quiz_audio.track_id).await?;
        let preview_url = self.resolver.resolve(&track).await?;
        info!(track_id = track.id, %preview_url, "Resolved preview");

        let scratch = scratch_dir()?;
        let stems = download_and_separate(
            &self.downloader,
            &self.separator,
            &self.model,
            &preview_url,
            scratch.path(),
            Arc::new(LoggingProgress::new(format!("quiz-{}", quiz_audio_id))),
        )
        .await?;

        let timed: Vec<TimedStem> = timings
            .iter()
            .map(|(name, start)| {
                stems
                    .get(name)
                    .map(|path| TimedStem {
                        name: name.clone(),
                        path: path.clone(),
                        start_secs: *start,
                    })
                    .ok_or_else(|| {
                        WorkerError::Mixing(format!("separation produced no '{}' stem", name))
                    })
            })
            .collect::<WorkerResult<_>>()?;

        let render = scratch.path().join(QUIZ_RENDER_NAME);
        self.mixer.mix(&timed, &render).await?;

        let url = self
            .storage
            .upload_if_absent(&quiz_render_key(quiz_audio.track_id), &render)
            .await?;

        self.core_api
            .update_quiz_audio(quiz_audio_id, &QuizAudioUpdate::prepared(url.clone()))
            .await?;

        info!(quiz_audio_id, %url, "Quiz audio prepared");
        Ok(url)
    }
}
