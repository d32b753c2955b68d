// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Audio backend driving the `ffmpeg` and `ffprobe` binaries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::AudioError;

use super::AudioBackend;

/// Bounds of a single ffmpeg `atempo` filter
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// VBR quality passed to libmp3lame (`-q:a`)
const MP3_QUALITY: &str = "2";

/// Backend running ffmpeg/ffprobe as child processes
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegBackend {
    /// Use `FFMPEG_PATH`/`FFPROBE_PATH` when set, else the binaries on `PATH`
    pub fn new() -> Self {
        Self {
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        }
    }

    pub fn with_paths(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<String, AudioError> {
        debug!(program, ?args, "Running audio command");

        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AudioError::SpawnFailed {
                program: program.to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .trim()
                .to_string();

            return Err(AudioError::CommandFailed {
                program: program.to_string(),
                code: output.status.code().unwrap_or(-1),
                message,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Express a speed factor as a chain of `atempo` filters each within ffmpeg's range
pub fn atempo_chain(speed: f64) -> String {
    let mut remaining = speed;
    let mut stages = Vec::new();

    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);

    stages
        .iter()
        .map(|s| format!("atempo={}", format_secs(*s)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a float without trailing noise (`1.4`, not `1.4000000000000001`)
fn format_secs(value: f64) -> String {
    let rounded = format!("{:.6}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn common_args() -> Vec<String> {
    ["-y", "-hide_banner", "-nostats", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn encode_args(output: &Path) -> Vec<String> {
    vec![
        "-vn".to_string(),
        "-map_metadata".to_string(),
        "0".to_string(),
        "-c:a".to_string(),
        "libmp3lame".to_string(),
        "-q:a".to_string(),
        MP3_QUALITY.to_string(),
        "-f".to_string(),
        "mp3".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Build ffmpeg arguments cutting `start_secs` off the front and keeping at
/// most `keep_secs` after that
pub fn build_trim_args(
    input: &Path,
    output: &Path,
    start_secs: f64,
    keep_secs: Option<f64>,
) -> Vec<String> {
    let mut args = common_args();

    if start_secs > 0.0 {
        args.extend(["-ss".to_string(), format_secs(start_secs)]);
    }
    args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);
    if let Some(keep) = keep_secs {
        args.extend(["-t".to_string(), format_secs(keep.max(0.0))]);
    }

    args.extend(encode_args(output));
    args
}

/// Build ffmpeg arguments re-encoding at `speed` with constant pitch
pub fn build_tempo_args(input: &Path, output: &Path, speed: f64) -> Vec<String> {
    let mut args = common_args();
    args.extend(["-i".to_string(), input.to_string_lossy().to_string()]);
    args.extend(["-filter:a".to_string(), atempo_chain(speed)]);
    args.extend(encode_args(output));
    args
}

/// Build ffprobe arguments printing the container duration in seconds
pub fn build_probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        input.to_string_lossy().to_string(),
    ]
}

fn parse_duration(path: &Path, stdout: &str) -> Result<f64, AudioError> {
    let value = stdout.trim();
    value
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AudioError::ProbeFailed {
            path: PathBuf::from(path),
            reason: format!("unexpected ffprobe output '{}'", value),
        })
}

#[async_trait]
impl AudioBackend for FfmpegBackend {
    async fn duration(&self, path: &Path) -> Result<f64, AudioError> {
        let stdout = self.run(&self.ffprobe_path, &build_probe_args(path)).await?;
        parse_duration(path, &stdout)
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        keep_secs: Option<f64>,
    ) -> Result<(), AudioError> {
        let args = build_trim_args(input, output, start_secs, keep_secs);
        self.run(&self.ffmpeg_path, &args).await.map(|_| ())
    }

    async fn change_tempo(
        &self,
        input: &Path,
        output: &Path,
        speed: f64,
    ) -> Result<(), AudioError> {
        let args = build_tempo_args(input, output, speed);
        self.run(&self.ffmpeg_path, &args).await.map(|_| ())
    }
}
