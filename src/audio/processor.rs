// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::AudioError;
use crate::progress::{ProgressEvent, SharedProgressReporter};

use super::AudioBackend;

/// A single transformation applied to a downloaded episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioOperation {
    /// Drop `start_secs` from the front and `end_secs` from the back
    Trim { start_secs: u32, end_secs: u32 },
    /// Constant-pitch time stretch by `speed`
    Tempo { speed: f64 },
}

impl std::fmt::Display for AudioOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trim {
                start_secs,
                end_secs,
            } => write!(f, "Trimming [start = {start_secs}s, end = {end_secs}s]"),
            Self::Tempo { speed } => write!(f, "Changing speed [{speed}x]"),
        }
    }
}

/// Operations to apply for the given settings, trim always before tempo
pub fn plan_operations(
    trim_start_secs: u32,
    trim_end_secs: u32,
    speed: f64,
) -> Vec<AudioOperation> {
    let mut operations = Vec::new();

    if trim_start_secs > 0 || trim_end_secs > 0 {
        operations.push(AudioOperation::Trim {
            start_secs: trim_start_secs,
            end_secs: trim_end_secs,
        });
    }
    if speed != 1.0 {
        operations.push(AudioOperation::Tempo { speed });
    }

    operations
}

/// Seconds of audio left after trimming, or `None` when the tail is kept
pub fn trimmed_length(duration_secs: f64, start_secs: u32, end_secs: u32) -> Option<f64> {
    if end_secs == 0 {
        None
    } else {
        Some((duration_secs - f64::from(start_secs) - f64::from(end_secs)).max(0.0))
    }
}

/// Summary of processing one file
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub original_secs: Option<f64>,
    pub final_secs: Option<f64>,
    /// Operations that completed
    pub applied: Vec<AudioOperation>,
    /// Operations that failed, with the error text
    pub failed: Vec<(AudioOperation, String)>,
}

/// Applies trim and tempo changes to staged episodes in place
#[derive(Debug, Clone)]
pub struct AudioProcessor<B> {
    backend: B,
}

impl<B: AudioBackend> AudioProcessor<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Process `path` in place.
    ///
    /// Every step writes a sibling file and replaces the original only on
    /// success, so a failing step leaves the last good version behind.
    pub async fn process(
        &self,
        path: &Path,
        trim_start_secs: u32,
        trim_end_secs: u32,
        speed: f64,
        episode_title: &str,
        reporter: &SharedProgressReporter,
    ) -> ProcessReport {
        let operations = plan_operations(trim_start_secs, trim_end_secs, speed);
        let mut report = ProcessReport {
            original_secs: self.backend.duration(path).await.ok(),
            ..Default::default()
        };

        if operations.is_empty() {
            report.final_secs = report.original_secs;
            return report;
        }

        // Left over from an interrupted run
        let stale = work_path_for(path);
        if tokio::fs::try_exists(&stale).await.unwrap_or(false) {
            warn!(path = %stale.display(), "Removing stale audio work file");
            let _ = tokio::fs::remove_file(&stale).await;
        }

        for operation in operations {
            reporter.report(ProgressEvent::AudioStepStarted {
                episode_title: episode_title.to_string(),
                description: operation.to_string(),
            });

            match self.apply(path, operation).await {
                Ok(()) => {
                    info!(title = episode_title, %operation, "Audio step done");
                    report.applied.push(operation);
                }
                Err(e) => {
                    warn!(
                        title = episode_title,
                        %operation,
                        "Audio step failed, keeping previous file: {}",
                        e
                    );
                    reporter.report(ProgressEvent::AudioStepFailed {
                        episode_title: episode_title.to_string(),
                        description: operation.to_string(),
                        error: e.to_string(),
                    });
                    report.failed.push((operation, e.to_string()));
                }
            }
        }

        report.final_secs = self.backend.duration(path).await.ok();
        report
    }

    async fn apply(&self, path: &Path, operation: AudioOperation) -> Result<(), AudioError> {
        let work_path = work_path_for(path);

        let result = match operation {
            AudioOperation::Trim {
                start_secs,
                end_secs,
            } => {
                let keep = if end_secs > 0 {
                    let duration = self.backend.duration(path).await?;
                    trimmed_length(duration, start_secs, end_secs)
                } else {
                    None
                };
                self.backend
                    .trim(path, &work_path, f64::from(start_secs), keep)
                    .await
            }
            AudioOperation::Tempo { speed } => {
                self.backend.change_tempo(path, &work_path, speed).await
            }
        };

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&work_path).await;
            return Err(e);
        }

        tokio::fs::rename(&work_path, path)
            .await
            .map_err(|e| AudioError::ReplaceFailed {
                path: path.to_path_buf(),
                source: e,
            })
    }
}

/// Sibling path for an in-progress step. It does not end in the episode
/// extension, so publishing and retention never pick it up.
fn work_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".processing");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Fake backend modelling a file's duration as its content: one byte per second
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        fail_tempo: bool,
        fail_trim: bool,
    }

    #[async_trait]
    impl AudioBackend for FakeBackend {
        async fn duration(&self, path: &Path) -> Result<f64, AudioError> {
            let len = std::fs::metadata(path)
                .map_err(|e| AudioError::ReplaceFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?
                .len();
            Ok(len as f64)
        }

        async fn trim(
            &self,
            input: &Path,
            output: &Path,
            start_secs: f64,
            keep_secs: Option<f64>,
        ) -> Result<(), AudioError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("trim {start_secs} {keep_secs:?}"));
            if self.fail_trim {
                std::fs::write(output, b"half written").unwrap();
                return Err(AudioError::CommandFailed {
                    program: "fake".to_string(),
                    code: 1,
                    message: "corrupt input".to_string(),
                });
            }
            let data = std::fs::read(input).unwrap();
            let start = (start_secs as usize).min(data.len());
            let end = match keep_secs {
                Some(keep) => (start + keep as usize).min(data.len()),
                None => data.len(),
            };
            std::fs::write(output, &data[start..end]).unwrap();
            Ok(())
        }

        async fn change_tempo(
            &self,
            input: &Path,
            output: &Path,
            speed: f64,
        ) -> Result<(), AudioError> {
            self.calls.lock().unwrap().push(format!("tempo {speed}"));
            if self.fail_tempo {
                return Err(AudioError::CommandFailed {
                    program: "fake".to_string(),
                    code: 1,
                    message: "malformed audio".to_string(),
                });
            }
            let data = std::fs::read(input).unwrap();
            let new_len = (data.len() as f64 / speed).round() as usize;
            std::fs::write(output, &data[..new_len.min(data.len())]).unwrap();
            Ok(())
        }
    }

    fn write_audio(dir: &Path, seconds: usize) -> PathBuf {
        let path = dir.join("Show - Episode.mp3");
        std::fs::write(&path, vec![0u8; seconds]).unwrap();
        path
    }

    #[test]
    fn plan_orders_trim_before_tempo() {
        assert_eq!(
            plan_operations(30, 80, 1.4),
            vec![
                AudioOperation::Trim {
                    start_secs: 30,
                    end_secs: 80
                },
                AudioOperation::Tempo { speed: 1.4 },
            ]
        );
    }

    #[test]
    fn plan_skips_noop_steps() {
        assert!(plan_operations(0, 0, 1.0).is_empty());
        assert_eq!(
            plan_operations(0, 10, 1.0),
            vec![AudioOperation::Trim {
                start_secs: 0,
                end_secs: 10
            }]
        );
        assert_eq!(
            plan_operations(0, 0, 1.5),
            vec![AudioOperation::Tempo { speed: 1.5 }]
        );
    }

    #[test]
    fn trimmed_length_never_negative() {
        assert_eq!(trimmed_length(600.0, 30, 80), Some(490.0));
        assert_eq!(trimmed_length(60.0, 30, 80), Some(0.0));
        assert_eq!(trimmed_length(600.0, 30, 0), None);
    }

    #[test]
    fn work_path_is_not_an_episode_file() {
        let work = work_path_for(Path::new("/s/Show - Ep.mp3"));

        assert_eq!(work, PathBuf::from("/s/Show - Ep.mp3.processing"));
        let name = work.file_name().unwrap().to_str().unwrap();
        assert!(!crate::episode::is_episode_file(name));
    }

    #[tokio::test]
    async fn stale_work_file_is_removed_before_processing() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 600);
        std::fs::write(work_path_for(&path), b"interrupted").unwrap();
        let processor = AudioProcessor::new(FakeBackend::default());

        processor
            .process(&path, 30, 0, 1.0, "Episode", &NoopReporter::shared())
            .await;

        assert!(!work_path_for(&path).exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 570);
    }

    #[tokio::test]
    async fn trim_then_tempo_gives_expected_duration() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 600);
        let processor = AudioProcessor::new(FakeBackend::default());

        let report = processor
            .process(&path, 30, 80, 1.4, "Episode", &NoopReporter::shared())
            .await;

        assert_eq!(report.original_secs, Some(600.0));
        // (600 - 30 - 80) / 1.4 = 350
        assert_eq!(report.final_secs, Some(350.0));
        assert_eq!(report.applied.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(
            *processor.backend().calls.lock().unwrap(),
            vec!["trim 30 Some(490.0)".to_string(), "tempo 1.4".to_string()]
        );
        assert!(!work_path_for(&path).exists());
    }

    #[tokio::test]
    async fn trim_start_only_keeps_tail() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 400);
        let processor = AudioProcessor::new(FakeBackend::default());

        let report = processor
            .process(&path, 305, 0, 1.0, "Episode", &NoopReporter::shared())
            .await;

        assert_eq!(report.final_secs, Some(95.0));
        assert_eq!(
            *processor.backend().calls.lock().unwrap(),
            vec!["trim 305 None".to_string()]
        );
    }

    #[tokio::test]
    async fn trimming_short_file_is_degenerate_not_error() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 50);
        let processor = AudioProcessor::new(FakeBackend::default());

        let report = processor
            .process(&path, 30, 80, 1.0, "Episode", &NoopReporter::shared())
            .await;

        assert!(report.failed.is_empty());
        assert_eq!(report.final_secs, Some(0.0));
    }

    #[tokio::test]
    async fn failed_tempo_leaves_trimmed_file() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 300);
        let processor = AudioProcessor::new(FakeBackend {
            fail_tempo: true,
            ..Default::default()
        });

        let report = processor
            .process(&path, 10, 40, 1.5, "Episode", &NoopReporter::shared())
            .await;

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0].0, AudioOperation::Tempo { .. }));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 250);
    }

    #[tokio::test]
    async fn failed_trim_leaves_original_and_removes_work_file() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 300);
        let processor = AudioProcessor::new(FakeBackend {
            fail_trim: true,
            ..Default::default()
        });

        let report = processor
            .process(&path, 10, 40, 1.0, "Episode", &NoopReporter::shared())
            .await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 300);
        assert!(!work_path_for(&path).exists());
    }

    #[tokio::test]
    async fn untouched_settings_do_not_invoke_backend_steps() {
        let dir = tempdir().unwrap();
        let path = write_audio(dir.path(), 120);
        let processor = AudioProcessor::new(FakeBackend::default());

        let report = processor
            .process(&path, 0, 0, 1.0, "Episode", &NoopReporter::shared())
            .await;

        assert!(processor.backend().calls.lock().unwrap().is_empty());
        assert_eq!(report.final_secs, Some(120.0));
    }
}
