// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use crate::config::ShowConfig;
use crate::error::FeedError;

/// One candidate episode as reported by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRecord {
    pub title: String,
    /// Enclosure (media) URL
    pub url: Url,
    /// Publication time in epoch seconds, UTC
    pub published_at: i64,
}

impl EpisodeRecord {
    /// Publication time as a UTC date, if representable
    pub fn published(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.published_at, 0)
    }
}

/// A provider of episode listings for a show.
///
/// Implementations return at most `max_count` records published strictly
/// after `since`, newest first.
#[async_trait]
pub trait EpisodeSource: Send + Sync {
    async fn list_episodes(
        &self,
        show: &ShowConfig,
        since: i64,
        max_count: usize,
    ) -> Result<Vec<EpisodeRecord>, FeedError>;
}

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// List episodes, retrying transient failures according to `policy`.
///
/// Returns the last error once every attempt has failed.
pub async fn list_episodes_with_retry(
    source: &dyn EpisodeSource,
    show: &ShowConfig,
    since: i64,
    max_count: usize,
    policy: &RetryPolicy,
) -> Result<Vec<EpisodeRecord>, FeedError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match source.list_episodes(show, since, max_count).await {
            Ok(episodes) => return Ok(episodes),
            Err(e) if attempt < attempts => {
                warn!(
                    show = %show.name,
                    attempt,
                    "Listing episodes failed, retrying in {:?}: {}",
                    policy.delay,
                    e
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Keep records newer than `since`, newest first, at most `max_count` of them.
///
/// Records with equal timestamps keep their source order.
pub(crate) fn select_newest(
    mut records: Vec<EpisodeRecord>,
    since: i64,
    max_count: usize,
) -> Vec<EpisodeRecord> {
    let before = records.len();
    records.retain(|r| r.published_at > since);
    debug!(
        total = before,
        newer = records.len(),
        since,
        "Filtered episode listing by watermark"
    );

    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    records.truncate(max_count);
    records
}
