// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::sync::Arc;

/// Why an episode was not downloaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Published at or before the last successful run
    BeforeWatermark,
    /// Already present in staging or on the destination
    AlreadyPresent,
}

/// Events emitted during a pipeline run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Waiting for the removable device to appear
    WaitingForDestination {
        path: PathBuf,
        elapsed_secs: u64,
        timeout_secs: u64,
    },

    /// The run was skipped because the last one was too recent
    Throttled { watermark: i64 },

    /// The run is starting with the given watermark
    RunStarted { watermark: i64, show_count: usize },

    /// Episodes for a show are being listed
    ListingEpisodes { show: String, source: String },

    /// Episode listing failed after all retries; the show is skipped
    SourceFailed { show: String, error: String },

    /// An episode was considered for download
    EpisodeFound {
        show: String,
        episode_title: String,
        published_at: i64,
    },

    /// An episode was not downloaded
    EpisodeSkipped {
        episode_title: String,
        reason: SkipReason,
    },

    /// A download is starting
    DownloadStarting {
        episode_title: String,
        /// Expected content length in bytes, if known
        content_length: Option<u64>,
    },

    /// Download progress update
    DownloadProgress {
        episode_title: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// A download completed successfully
    DownloadCompleted {
        episode_title: String,
        bytes_downloaded: u64,
    },

    /// A download failed
    DownloadFailed { episode_title: String, error: String },

    /// An audio processing step is starting
    AudioStepStarted {
        episode_title: String,
        description: String,
    },

    /// An audio processing step failed; the file keeps its previous state
    AudioStepFailed {
        episode_title: String,
        description: String,
        error: String,
    },

    /// Processing of an episode finished
    AudioProcessed {
        episode_title: String,
        original_secs: Option<f64>,
        final_secs: Option<f64>,
    },

    /// The destination was not mounted when publishing
    DestinationUnavailable { path: PathBuf },

    /// Staged files of one category were moved to the destination
    Published { category: String, count: usize },

    /// Publishing a category failed
    PublishFailed { category: String, error: String },

    /// Old episodes of a show were removed from the destination
    Pruned { show: String, removed: usize },

    /// The watermark was advanced
    WatermarkCommitted { previous: i64, current: i64 },

    /// The watermark was left unchanged so failed episodes are retried
    WatermarkHeld { watermark: i64 },

    /// The run finished
    RunCompleted {
        downloaded_count: usize,
        skipped_count: usize,
        failed_count: usize,
        published: bool,
    },
}

/// Trait for reporting progress events during a run.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
