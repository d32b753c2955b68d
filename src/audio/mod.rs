// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod ffmpeg;
mod processor;

use std::path::Path;

use async_trait::async_trait;

use crate::error::AudioError;

pub use ffmpeg::{FfmpegBackend, atempo_chain, build_probe_args, build_tempo_args, build_trim_args};
pub use processor::{AudioOperation, AudioProcessor, ProcessReport, plan_operations, trimmed_length};

/// Codec-level audio operations the processor relies on
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Duration of the audio at `path` in seconds
    async fn duration(&self, path: &Path) -> Result<f64, AudioError>;

    /// Write `input` minus its first `start_secs` to `output`, keeping at most
    /// `keep_secs` when given
    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        keep_secs: Option<f64>,
    ) -> Result<(), AudioError>;

    /// Write `input` to `output` played `speed` times faster, pitch unchanged
    async fn change_tempo(&self, input: &Path, output: &Path, speed: f64)
    -> Result<(), AudioError>;
}

/// Format a duration the way progress output prints it
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{} minutes and {} seconds", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_splits_minutes() {
        assert_eq!(format_duration(754.9), "12 minutes and 34 seconds");
        assert_eq!(format_duration(-3.0), "0 minutes and 0 seconds");
    }
}
