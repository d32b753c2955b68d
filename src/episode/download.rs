// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::feed::EpisodeRecord;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter, SkipReason};

/// Suffix of files that are still being written
const PARTIAL_SUFFIX: &str = ".partial";

/// Where an episode lives locally and on the device
#[derive(Debug, Clone)]
pub struct EpisodePaths {
    pub staging: PathBuf,
    pub destination: PathBuf,
}

impl EpisodePaths {
    /// Whether the episode already exists in staging or on the destination
    pub fn already_present(&self) -> bool {
        self.staging.exists() || self.destination.exists()
    }
}

/// Result of considering one episode for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new file was written to the staging path
    Downloaded { bytes: u64 },
    /// Nothing was fetched
    Skipped(SkipReason),
}

/// Decide whether an episode should be fetched, without touching the network
pub fn check_episode(
    episode: &EpisodeRecord,
    watermark: i64,
    paths: &EpisodePaths,
) -> Option<SkipReason> {
    if episode.published_at <= watermark {
        Some(SkipReason::BeforeWatermark)
    } else if paths.already_present() {
        Some(SkipReason::AlreadyPresent)
    } else {
        None
    }
}

/// Fetch an episode into staging unless it is old or already present.
///
/// Files smaller than `min_bytes` are deleted and reported as
/// [`DownloadError::TooSmall`], so the episode is fetched again next run.
pub async fn fetch_episode<C: HttpClient>(
    client: &C,
    episode: &EpisodeRecord,
    watermark: i64,
    paths: &EpisodePaths,
    min_bytes: u64,
    reporter: &SharedProgressReporter,
) -> Result<FetchOutcome, DownloadError> {
    if let Some(reason) = check_episode(episode, watermark, paths) {
        debug!(title = %episode.title, ?reason, "Skipping episode");
        reporter.report(ProgressEvent::EpisodeSkipped {
            episode_title: episode.title.clone(),
            reason,
        });
        return Ok(FetchOutcome::Skipped(reason));
    }

    let partial_path = partial_path_for(&paths.staging);
    let result = download_episode(client, episode, &partial_path, reporter).await;

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            remove_quietly(&partial_path).await;
            return Err(e);
        }
    };

    if bytes < min_bytes {
        warn!(
            title = %episode.title,
            bytes,
            "Downloaded file is too small, discarding"
        );
        remove_quietly(&partial_path).await;
        return Err(DownloadError::TooSmall { size: bytes });
    }

    tokio::fs::rename(&partial_path, &paths.staging)
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: paths.staging.clone(),
            source: e,
        })?;

    info!(title = %episode.title, bytes, path = %paths.staging.display(), "Episode downloaded");
    Ok(FetchOutcome::Downloaded { bytes })
}

/// Download an episode's enclosure to the specified output path
///
/// Streams the response body to disk, reporting progress through the reporter.
/// Returns the number of bytes downloaded on success.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    episode: &EpisodeRecord,
    output_path: &Path,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = episode.url.as_str();

    let response = client
        .get_stream(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if !response.is_success() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        episode_title: episode.title.clone(),
        content_length: response.content_length,
    });

    let mut file =
        File::create(output_path)
            .await
            .map_err(|e| DownloadError::FileCreateFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            episode_title: episode.title.clone(),
            bytes_downloaded,
            total_bytes: response.content_length,
        });
    }

    file.flush()
        .await
        .map_err(|e| DownloadError::FileWriteFailed {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    reporter.report(ProgressEvent::DownloadCompleted {
        episode_title: episode.title.clone(),
        bytes_downloaded,
    });

    Ok(bytes_downloaded)
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), "Could not remove partial download: {}", e);
    }
}
