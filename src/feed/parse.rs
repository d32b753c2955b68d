// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset};
use tracing::debug;
use url::Url;

use crate::error::FeedError;

use super::source::EpisodeRecord;

/// Parse RSS feed XML bytes into episode records.
///
/// Items without an enclosure or a usable publication date are skipped.
/// Relative enclosure URLs are resolved against `feed_url`.
pub fn parse_feed(xml_bytes: &[u8], feed_url: &Url) -> Result<Vec<EpisodeRecord>, FeedError> {
    let channel = rss::Channel::read_from(xml_bytes)?;

    let episodes = channel
        .items()
        .iter()
        .filter_map(|item| match parse_episode(item, feed_url) {
            Ok(episode) => Some(episode),
            Err(e) => {
                debug!("Skipping feed item: {}", e);
                None
            }
        })
        .collect();

    Ok(episodes)
}

fn parse_episode(item: &rss::Item, feed_url: &Url) -> Result<EpisodeRecord, FeedError> {
    let title = item
        .title()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let enclosure = item
        .enclosure()
        .ok_or_else(|| FeedError::MissingEnclosure {
            title: title.clone(),
        })?;

    let url = feed_url.join(enclosure.url().trim())?;

    let published = item
        .pub_date()
        .and_then(|date_str| {
            DateTime::parse_from_rfc2822(date_str.trim())
                .ok()
                .or_else(|| parse_relaxed_date(date_str.trim()))
        })
        .ok_or_else(|| FeedError::MissingDate {
            title: title.clone(),
        })?;

    Ok(EpisodeRecord {
        title,
        url,
        published_at: published.timestamp(),
    })
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    formats
        .iter()
        .find_map(|format| DateTime::parse_from_str(date_str, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(date_str).ok())
}
