// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::audio::{AudioBackend, AudioProcessor};
use crate::config::{RunConfig, ShowConfig, ShowSource};
use crate::destination::{is_mounted, prune, publish};
use crate::episode::{EpisodePaths, FetchOutcome, episode_filename, fetch_episode};
use crate::error::{FeedError, SyncError};
use crate::feed::{EpisodeSource, FeedSource, IndexApiSource, list_episodes_with_retry};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::WatermarkStore;

/// Result of a pipeline run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Watermark the run started from
    pub watermark: i64,
    /// Episodes downloaded into staging
    pub downloaded: usize,
    /// Episodes skipped (old or already present)
    pub skipped: usize,
    /// Episodes whose download failed
    pub failed: usize,
    /// Failures by episode title or show name, with the error text
    pub failures: Vec<(String, String)>,
    /// Whether the destination was mounted at publish time
    pub destination_available: bool,
    /// Files moved to the destination
    pub published: usize,
    /// Files removed by retention
    pub pruned: usize,
    /// New watermark, if it was advanced
    pub committed_watermark: Option<i64>,
}

/// Run the whole pipeline: list, fetch, process, publish, prune, commit.
///
/// Failures of single episodes or shows are recorded in the report and do
/// not stop the run. A show whose source cannot be listed is skipped; the
/// watermark still advances past it. Failed downloads and failed publishing
/// hold the watermark so the next run retries them.
pub async fn run_pipeline<C, B>(
    client: &C,
    audio: &AudioProcessor<B>,
    shows: &[ShowConfig],
    config: &RunConfig,
    reporter: SharedProgressReporter,
) -> Result<RunReport, SyncError>
where
    C: HttpClient + Clone,
    B: AudioBackend,
{
    let store = WatermarkStore::new(&config.destination_root, &config.watermark_fallback);
    let watermark = store.read()?;

    let mut report = RunReport {
        watermark,
        ..Default::default()
    };
    let mut incomplete = false;

    reporter.report(ProgressEvent::RunStarted {
        watermark,
        show_count: shows.len(),
    });
    info!(watermark, shows = shows.len(), "Starting run");

    let feed_source = FeedSource::new(client.clone());
    let index_source = config
        .index_credentials
        .clone()
        .map(|credentials| IndexApiSource::new(client.clone(), credentials));

    for show in shows {
        let source: &dyn EpisodeSource = match (&show.source, &index_source) {
            (ShowSource::Feed(_), _) => &feed_source,
            (ShowSource::PodcastIndex(_), Some(index)) => index,
            (ShowSource::PodcastIndex(_), None) => {
                let error = FeedError::MissingCredentials;
                record_source_failure(&mut report, &reporter, show, &error);
                continue;
            }
        };

        if !process_show(client, audio, source, show, watermark, config, &reporter, &mut report)
            .await
        {
            incomplete = true;
        }
    }

    if !is_mounted(&config.destination_root) {
        warn!(
            destination = %config.destination_root.display(),
            "Destination not mounted, leaving episodes in staging"
        );
        reporter.report(ProgressEvent::DestinationUnavailable {
            path: config.destination_root.clone(),
        });
        finish(&mut report, &reporter);
        return Ok(report);
    }
    report.destination_available = true;

    let publish_ok = publish_all(shows, config, &reporter, &mut report);
    prune_all(shows, config, &reporter, &mut report);

    if !publish_ok {
        warn!("Publishing was incomplete, watermark not advanced");
        reporter.report(ProgressEvent::WatermarkHeld { watermark });
    } else if incomplete {
        info!("Some downloads failed, watermark kept so they are retried");
        reporter.report(ProgressEvent::WatermarkHeld { watermark });
    } else {
        let now = Utc::now().timestamp();
        match store.commit(now) {
            Ok(previous) => {
                report.committed_watermark = Some(now);
                reporter.report(ProgressEvent::WatermarkCommitted {
                    previous,
                    current: now,
                });
            }
            Err(e) => {
                warn!("Watermark not stored: {}", e);
                report
                    .failures
                    .push((store.location().display().to_string(), e.to_string()));
                reporter.report(ProgressEvent::WatermarkHeld { watermark });
            }
        }
    }

    finish(&mut report, &reporter);
    Ok(report)
}

/// List, fetch and process one show.
///
/// Returns false if the show's episodes could not be staged. A source that
/// cannot be listed skips the show without holding the watermark.
#[allow(clippy::too_many_arguments)]
async fn process_show<C, B>(
    client: &C,
    audio: &AudioProcessor<B>,
    source: &dyn EpisodeSource,
    show: &ShowConfig,
    watermark: i64,
    config: &RunConfig,
    reporter: &SharedProgressReporter,
    report: &mut RunReport,
) -> bool
where
    C: HttpClient,
    B: AudioBackend,
{
    reporter.report(ProgressEvent::ListingEpisodes {
        show: show.name.clone(),
        source: show.source.to_string(),
    });

    let episodes = match list_episodes_with_retry(
        source,
        show,
        watermark,
        show.max_episodes,
        &config.retry,
    )
    .await
    {
        Ok(episodes) => episodes,
        Err(e) => {
            record_source_failure(report, reporter, show, &e);
            return true;
        }
    };

    let staging_dir = config.staging_category_dir(show);
    let destination_dir = config.destination_category_dir(show);
    if let Err(e) = std::fs::create_dir_all(&staging_dir) {
        warn!(show = %show.name, "Cannot create staging directory: {}", e);
        report.failures.push((show.name.clone(), e.to_string()));
        return false;
    }

    let mut complete = true;
    for episode in episodes {
        reporter.report(ProgressEvent::EpisodeFound {
            show: show.name.clone(),
            episode_title: episode.title.clone(),
            published_at: episode.published_at,
        });

        let filename = episode_filename(&show.name, &episode.title);
        let paths = EpisodePaths {
            staging: staging_dir.join(&filename),
            destination: destination_dir.join(&filename),
        };

        let outcome = fetch_episode(
            client,
            &episode,
            watermark,
            &paths,
            config.min_episode_bytes,
            reporter,
        )
        .await;

        match outcome {
            Ok(FetchOutcome::Downloaded { .. }) => {
                report.downloaded += 1;
                let processed = audio
                    .process(
                        &paths.staging,
                        show.trim_start_secs,
                        show.trim_end_secs,
                        show.speed,
                        &episode.title,
                        reporter,
                    )
                    .await;
                reporter.report(ProgressEvent::AudioProcessed {
                    episode_title: episode.title.clone(),
                    original_secs: processed.original_secs,
                    final_secs: processed.final_secs,
                });
            }
            Ok(FetchOutcome::Skipped(_)) => report.skipped += 1,
            Err(e) => {
                warn!(show = %show.name, title = %episode.title, "Download failed: {}", e);
                reporter.report(ProgressEvent::DownloadFailed {
                    episode_title: episode.title.clone(),
                    error: e.to_string(),
                });
                report.failed += 1;
                report.failures.push((episode.title.clone(), e.to_string()));
                complete = false;
            }
        }
    }

    complete
}

fn record_source_failure(
    report: &mut RunReport,
    reporter: &SharedProgressReporter,
    show: &ShowConfig,
    error: &FeedError,
) {
    warn!(show = %show.name, "Skipping show: {}", error);
    reporter.report(ProgressEvent::SourceFailed {
        show: show.name.clone(),
        error: error.to_string(),
    });
    report.failures.push((show.name.clone(), error.to_string()));
}

/// Publish every category once, in table order. Returns false on any failure.
fn publish_all(
    shows: &[ShowConfig],
    config: &RunConfig,
    reporter: &SharedProgressReporter,
    report: &mut RunReport,
) -> bool {
    let mut seen = HashSet::new();
    let mut ok = true;

    for show in shows {
        if !seen.insert(show.category.as_str()) {
            continue;
        }

        let staging_dir = config.staging_category_dir(show);
        let destination_dir = config.destination_category_dir(show);

        match publish(&staging_dir, &destination_dir) {
            Ok(count) => {
                report.published += count;
                reporter.report(ProgressEvent::Published {
                    category: show.category.clone(),
                    count,
                });
            }
            Err(e) => {
                warn!(category = %show.category, "Publishing failed: {}", e);
                reporter.report(ProgressEvent::PublishFailed {
                    category: show.category.clone(),
                    error: e.to_string(),
                });
                report.failures.push((show.category.clone(), e.to_string()));
                ok = false;
            }
        }
    }

    if ok {
        remove_empty_dir(&config.staging_root);
    }
    ok
}

/// Apply each show's own retention limit on the destination
fn prune_all(
    shows: &[ShowConfig],
    config: &RunConfig,
    reporter: &SharedProgressReporter,
    report: &mut RunReport,
) {
    for show in shows {
        let destination_dir = config.destination_category_dir(show);

        match prune(&destination_dir, &show.name, show.max_episodes) {
            Ok(removed) => {
                report.pruned += removed.len();
                if !removed.is_empty() {
                    reporter.report(ProgressEvent::Pruned {
                        show: show.name.clone(),
                        removed: removed.len(),
                    });
                }
            }
            Err(e) => {
                warn!(show = %show.name, "Pruning failed: {}", e);
                report.failures.push((show.name.clone(), e.to_string()));
            }
        }
    }
}

fn remove_empty_dir(path: &Path) {
    if let Err(e) = std::fs::remove_dir(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), "Staging root not removed: {}", e);
    }
}

fn finish(report: &mut RunReport, reporter: &SharedProgressReporter) {
    reporter.report(ProgressEvent::RunCompleted {
        downloaded_count: report.downloaded,
        skipped_count: report.skipped,
        failed_count: report.failed,
        published: report.destination_available,
    });
}
