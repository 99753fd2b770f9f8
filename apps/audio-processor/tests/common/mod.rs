//! Common test utilities for audio processor integration tests
//!
//! Provides instrumented job processors, a file-writing fake separator and
//! helpers for waiting on job state in the in-memory store.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use multitune_audio_processor::pipeline::{
    JobProcessor, ProgressObserver, Separator, StemFiles, StemMixer, TimedStem,
};
use multitune_audio_processor::{
    InMemoryJobStore, JobRecord, JobRepository, JobRequest, JobStatus, StemUrls, WorkerError,
    WorkerPool, WorkerResult,
};

pub const FOUR_STEMS: [&str; 4] = ["drums", "bass", "vocals", "other"];

/// Fixed reference time for sweep tests
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub fn request(job_id: &str, track_id: i64) -> JobRequest {
    JobRequest {
        job_id: job_id.to_string(),
        track_id,
        source_url: format!("http://x/{}.mp3", job_id),
    }
}

pub fn message(job_id: &str, track_id: i64) -> String {
    serde_json::json!({
        "jobId": job_id,
        "trackId": track_id,
        "preview": format!("http://x/{}.mp3", job_id),
    })
    .to_string()
}

/// In-memory store plus a repository over it
pub fn memory_repository() -> (Arc<InMemoryJobStore>, JobRepository) {
    let store = Arc::new(InMemoryJobStore::new());
    let repository = JobRepository::new(store.clone());
    (store, repository)
}

pub fn pool(
    max_concurrent: usize,
    repository: &JobRepository,
    processor: Arc<dyn JobProcessor>,
) -> WorkerPool {
    WorkerPool::new(
        max_concurrent,
        repository.clone(),
        processor,
        chrono::Duration::seconds(60),
    )
}

/// Poll the store until the job reaches `status`
pub async fn wait_for_status(
    repository: &JobRepository,
    job_id: &str,
    status: JobStatus,
) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(Some(Ok(record))) = repository.load(job_id).await {
            if record.status == status {
                return record;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} never reached {}", job_id, status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn stem_urls(track_id: i64, stems: &[&str]) -> StemUrls {
    stems
        .iter()
        .map(|stem| {
            (
                stem.to_string(),
                format!("https://storage.test/stems/{}/{}.mp3", track_id, stem),
            )
        })
        .collect()
}

/// Succeeds with fixed stems, tracking how many runs overlap
pub struct InstrumentedProcessor {
    stems: Vec<&'static str>,
    delay: Duration,
    running: AtomicUsize,
    pub max_running: AtomicUsize,
    pub calls: AtomicUsize,
}

impl InstrumentedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            stems: FOUR_STEMS.to_vec(),
            delay,
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobProcessor for InstrumentedProcessor {
    async fn process(&self, job: &JobRecord) -> WorkerResult<StemUrls> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(stem_urls(job.track_id, &self.stems))
    }
}

/// Blocks inside `process` until released
#[derive(Default)]
pub struct GatedProcessor {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl JobProcessor for GatedProcessor {
    async fn process(&self, job: &JobRecord) -> WorkerResult<StemUrls> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(stem_urls(job.track_id, &FOUR_STEMS))
    }
}

/// Always fails at the download stage
pub struct FailingProcessor;

#[async_trait]
impl JobProcessor for FailingProcessor {
    async fn process(&self, job: &JobRecord) -> WorkerResult<StemUrls> {
        Err(WorkerError::download(&job.source_url, "status 404"))
    }
}

/// Panics mid-pipeline
pub struct PanickingProcessor;

#[async_trait]
impl JobProcessor for PanickingProcessor {
    async fn process(&self, _job: &JobRecord) -> WorkerResult<StemUrls> {
        panic!("separator crashed");
    }
}

/// Writes one small file per stem and reports progress
pub struct FakeSeparator {
    pub stems: Vec<&'static str>,
    pub calls: AtomicUsize,
}

impl FakeSeparator {
    pub fn new(stems: &[&'static str]) -> Self {
        Self {
            stems: stems.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Separator for FakeSeparator {
    fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        _model: &str,
        progress: &dyn ProgressObserver,
    ) -> WorkerResult<StemFiles> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !input.exists() {
            return Err(WorkerError::Separation("input missing".to_string()));
        }

        std::fs::create_dir_all(output_dir)?;
        let mut stems = StemFiles::new();
        for (i, stem) in self.stems.iter().enumerate() {
            let path = output_dir.join(format!("{}.mp3", stem));
            std::fs::write(&path, format!("stem:{}", stem))?;
            stems.insert(stem.to_string(), path);
            progress.on_progress(((i + 1) * 100 / self.stems.len()) as f32);
        }
        Ok(stems)
    }
}

/// Records what it was asked to mix and writes a placeholder render
#[derive(Default)]
pub struct RecordingMixer {
    pub mixed: std::sync::Mutex<Vec<TimedStem>>,
}

#[async_trait]
impl StemMixer for RecordingMixer {
    async fn mix(&self, stems: &[TimedStem], output: &Path) -> WorkerResult<()> {
        self.mixed.lock().unwrap().extend_from_slice(stems);
        tokio::fs::write(output, b"merged").await?;
        Ok(())
    }
}
