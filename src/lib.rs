// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod audio;
pub mod config;
pub mod destination;
pub mod episode;
pub mod error;
pub mod feed;
pub mod http;
pub mod progress;
pub mod state;
pub mod sync;

// Re-export main types for convenience
pub use audio::{AudioBackend, AudioProcessor, FfmpegBackend, format_duration};
pub use config::{RunConfig, ShowConfig, ShowSource, default_shows, load_shows, validate_shows};
pub use destination::wait_for_destination;
pub use error::{
    AudioError, ConfigError, DestinationError, DownloadError, FeedError, StateError, SyncError,
};
pub use feed::{EpisodeRecord, EpisodeSource, IndexCredentials, RetryPolicy};
pub use http::{HttpClient, HttpResponse, ReqwestClient, Timeouts};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter, SkipReason,
};
pub use state::{THROTTLE_WINDOW, WatermarkStore, is_elevated, should_throttle};
pub use sync::{RunReport, run_pipeline};
