//! Processing pipelines
//!
//! A pipeline turns a job into stem URLs: download the source, separate it,
//! upload each stem. The quiz flow reuses the same stages and adds a mix.

mod download;
mod mixer;
mod quiz;
mod separation;
mod source;
mod storage;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::{WorkerError, WorkerResult};
use crate::jobs::{JobRecord, StemUrls};

pub use download::Downloader;
pub use mixer::{build_filter_graph, build_mix_args, FfmpegMixer, StemMixer, TimedStem};
pub use quiz::{quiz_render_key, QuizAudioPipeline, QUIZ_RENDER_NAME};
pub use separation::{
    parse_progress_line, progress_percent, separate_blocking, DemucsSeparator, LoggingProgress,
    ProgressObserver, Separator, StemFiles,
};
pub use source::SourceResolver;
pub use storage::{GcsStorage, ObjectStorage};

/// File name of the downloaded source inside a job's scratch directory
pub const INPUT_FILE_NAME: &str = "input.mp3";

/// Runs the work for one job
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &JobRecord) -> WorkerResult<StemUrls>;
}

/// Object key of a stem
pub fn stem_key(track_id: i64, stem: &str) -> String {
    format!("stems/{}/{}.mp3", track_id, stem)
}

/// Download a source into `scratch` and separate it
pub(crate) async fn download_and_separate(
    downloader: &Downloader,
    separator: &Arc<dyn Separator>,
    model: &str,
    source_url: &str,
    scratch: &Path,
    progress: Arc<dyn ProgressObserver>,
) -> WorkerResult<StemFiles> {
    let input = scratch.join(INPUT_FILE_NAME);
    downloader.download(source_url, &input).await?;

    let stems = separate_blocking(
        separator.clone(),
        input,
        scratch.join("separated"),
        model.to_string(),
        progress,
    )
    .await?;

    if stems.is_empty() {
        return Err(WorkerError::Separation("no stems produced".to_string()));
    }
    Ok(stems)
}

/// Scratch directory removed when dropped
pub(crate) fn scratch_dir() -> WorkerResult<tempfile::TempDir> {
    Ok(tempfile::Builder::new()
        .prefix("multitune-job-")
        .tempdir()?)
}

/// Download → separate → upload stems
pub struct StemPipeline {
    downloader: Downloader,
    separator: Arc<dyn Separator>,
    storage: Arc<dyn ObjectStorage>,
    model: String,
}

impl StemPipeline {
    pub fn new(
        downloader: Downloader,
        separator: Arc<dyn Separator>,
        storage: Arc<dyn ObjectStorage>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            downloader,
            separator,
            storage,
            model: model.into(),
        }
    }
}

#[async_trait]
impl JobProcessor for StemPipeline {
    #[instrument(skip(self, job), fields(job_id = %job.job_id, track_id = job.track_id))]
    async fn process(&self, job: &JobRecord) -> WorkerResult<StemUrls> {
        let scratch = scratch_dir()?;
        let stems = download_and_separate(
            &self.downloader,
            &self.separator,
            &self.model,
            &job.source_url,
            scratch.path(),
            Arc::new(LoggingProgress::new(job.job_id.clone())),
        )
        .await?;

        let mut urls = StemUrls::new();
        for (stem, path) in &stems {
            let url = self
                .storage
                .upload_if_absent(&stem_key(job.track_id, stem), path)
                .await?;
            urls.insert(stem.clone(), url);
        }

        info!(stems = urls.len(), "Stems stored");
        Ok(urls)
    }
}
