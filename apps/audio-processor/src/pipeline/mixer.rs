//! Quiz render mixing
//!
//! Each stem stays silent until its start time, then all stems are overlaid
//! into a single stereo MP3.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// A stem file with the offset at which it becomes audible
#[derive(Debug, Clone, PartialEq)]
pub struct TimedStem {
    pub name: String,
    pub path: PathBuf,
    pub start_secs: f64,
}

/// Mixes timed stems into one output file
#[async_trait]
pub trait StemMixer: Send + Sync {
    async fn mix(&self, stems: &[TimedStem], output: &Path) -> WorkerResult<()>;
}

/// Build the ffmpeg `-filter_complex` graph for `stems`
pub fn build_filter_graph(stems: &[TimedStem]) -> String {
    let mut graph = String::new();
    let mut labels = String::new();

    for (i, stem) in stems.iter().enumerate() {
        if stem.start_secs > 0.0 {
            graph.push_str(&format!(
                "[{i}:a]volume=enable='lt(t,{start})':volume=0[s{i}];",
                i = i,
                start = stem.start_secs
            ));
        } else {
            graph.push_str(&format!("[{i}:a]anull[s{i}];", i = i));
        }
        labels.push_str(&format!("[s{}]", i));
    }

    graph.push_str(&format!(
        "{}amix=inputs={}:duration=first:normalize=0[mix]",
        labels,
        stems.len()
    ));
    graph
}

/// Full ffmpeg argument list for mixing `stems` into `output`
pub fn build_mix_args(stems: &[TimedStem], output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];
    for stem in stems {
        args.push("-i".to_string());
        args.push(stem.path.display().to_string());
    }
    args.extend([
        "-filter_complex".to_string(),
        build_filter_graph(stems),
        "-map".to_string(),
        "[mix]".to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        "320k".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Mixer backed by the `ffmpeg` executable
#[derive(Debug, Clone)]
pub struct FfmpegMixer {
    ffmpeg_path: String,
}

impl FfmpegMixer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl StemMixer for FfmpegMixer {
    async fn mix(&self, stems: &[TimedStem], output: &Path) -> WorkerResult<()> {
        if stems.is_empty() {
            return Err(WorkerError::Mixing("no stems to mix".to_string()));
        }

        let args = build_mix_args(stems, output);
        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    WorkerError::Mixing(format!("ffmpeg not found at '{}'", self.ffmpeg_path))
                } else {
                    WorkerError::Mixing(e.to_string())
                }
            })?;

        if !result.status.success() {
            return Err(WorkerError::Mixing(format!(
                "ffmpeg exited with code {:?}: {}",
                result.status.code(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        info!(stems = stems.len(), output = %output.display(), "Mixed quiz audio");
        Ok(())
    }
}
