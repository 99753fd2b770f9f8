//! Stem separation
//!
//! The separation model is an external program driven on a blocking thread.
//! It reads one audio file and writes one file per stem; progress comes
//! back through a [`ProgressObserver`].

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Stem name → local file
pub type StemFiles = BTreeMap<String, PathBuf>;

/// Receives separation progress as a percentage in `[0, 100]`
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: f32);
}

/// Percentage of `processed` out of `total`, clamped to `[0, 100]`
///
/// A zero (or negative) total yields 0.
pub fn progress_percent(processed: f64, total: f64) -> f32 {
    if total <= 0.0 || !total.is_finite() || !processed.is_finite() {
        return 0.0;
    }
    ((processed / total) * 100.0).clamp(0.0, 100.0) as f32
}

/// Logs progress at debug level, once per whole percent
#[derive(Debug)]
pub struct LoggingProgress {
    job_id: String,
    last_percent: AtomicI32,
}

impl LoggingProgress {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            last_percent: AtomicI32::new(-1),
        }
    }
}

impl ProgressObserver for LoggingProgress {
    fn on_progress(&self, percent: f32) {
        let whole = percent.floor() as i32;
        if self.last_percent.swap(whole, Ordering::Relaxed) != whole {
            debug!(job_id = %self.job_id, percent = whole, "Separation progress");
        }
    }
}

/// Splits one audio file into named stems
///
/// Runs on a blocking thread; implementations may block freely.
pub trait Separator: Send + Sync {
    fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        model: &str,
        progress: &dyn ProgressObserver,
    ) -> WorkerResult<StemFiles>;
}

/// Run a separator on the blocking pool
pub async fn separate_blocking(
    separator: Arc<dyn Separator>,
    input: PathBuf,
    output_dir: PathBuf,
    model: String,
    progress: Arc<dyn ProgressObserver>,
) -> WorkerResult<StemFiles> {
    tokio::task::spawn_blocking(move || {
        separator.separate(&input, &output_dir, &model, progress.as_ref())
    })
    .await?
}

/// Progress from one line of separator output
///
/// Understands `tqdm` bars (`45%|###  | 5.85/13.0 [00:10<00:12]`), where the
/// `processed/total` pair wins over the rounded percentage.
pub fn parse_progress_line(line: &str) -> Option<f32> {
    if let Some(bar_end) = line.rfind('|') {
        let counts = line[bar_end + 1..].split('[').next().unwrap_or("").trim();
        if let Some((done, total)) = counts.split_once('/') {
            if let (Ok(done), Ok(total)) = (done.trim().parse::<f64>(), total.trim().parse::<f64>()) {
                return Some(progress_percent(done, total));
            }
        }
    }

    let percent_at = line.find('%')?;
    let digits: String = line[..percent_at]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits
        .parse::<f64>()
        .ok()
        .map(|p| progress_percent(p, 100.0))
}

/// Separator backed by the `demucs` command-line tool
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    command: String,
}

impl DemucsSeparator {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn build_args(input: &Path, output_dir: &Path, model: &str) -> Vec<String> {
        vec![
            "-n".to_string(),
            model.to_string(),
            "--mp3".to_string(),
            "--mp3-bitrate".to_string(),
            "320".to_string(),
            "-o".to_string(),
            output_dir.display().to_string(),
            input.display().to_string(),
        ]
    }

    /// Stem files written for `input` under `output_dir`
    fn collect_stems(input: &Path, output_dir: &Path, model: &str) -> WorkerResult<StemFiles> {
        let track_name = input
            .file_stem()
            .ok_or_else(|| WorkerError::Separation("input has no file name".to_string()))?;
        let stem_dir = output_dir.join(model).join(track_name);

        let entries = std::fs::read_dir(&stem_dir).map_err(|e| {
            WorkerError::Separation(format!("no output in {}: {}", stem_dir.display(), e))
        })?;

        let mut stems = StemFiles::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mp3") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                stems.insert(name.to_string(), path.clone());
            }
        }
        Ok(stems)
    }
}

/// Read `\r`- or `\n`-terminated segments, forwarding progress and keeping
/// the tail of non-progress output for error reports
fn pump_output<R: Read>(stream: R, progress: &dyn ProgressObserver) -> String {
    const KEEP_LINES: usize = 20;
    let mut tail: Vec<String> = Vec::new();

    for segment in BufReader::new(stream).split(b'\r') {
        let Ok(segment) = segment else { break };
        for line in String::from_utf8_lossy(&segment).lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_progress_line(line) {
                Some(percent) => progress.on_progress(percent),
                None => {
                    if tail.len() == KEEP_LINES {
                        tail.remove(0);
                    }
                    tail.push(line.to_string());
                }
            }
        }
    }
    tail.join("\n")
}

impl Separator for DemucsSeparator {
    fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        model: &str,
        progress: &dyn ProgressObserver,
    ) -> WorkerResult<StemFiles> {
        let args = Self::build_args(input, output_dir, model);
        info!(command = %self.command, model, input = %input.display(), "Starting separation");

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    WorkerError::Separation(format!("separator '{}' not found", self.command))
                } else {
                    WorkerError::Separation(format!("failed to start separator: {}", e))
                }
            })?;

        let output = match child.stderr.take() {
            Some(stderr) => pump_output(stderr, progress),
            None => String::new(),
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(WorkerError::Separation(format!(
                "separator exited with code {:?}: {}",
                status.code(),
                output
            )));
        }
        progress.on_progress(100.0);

        let stems = Self::collect_stems(input, output_dir, model)?;
        info!(stems = stems.len(), "Separation finished");
        Ok(stems)
    }
}
