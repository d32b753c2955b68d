// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::config::{ShowConfig, ShowSource};
use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::parse_feed;
use super::source::{EpisodeRecord, EpisodeSource, select_newest};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    client
        .get_bytes(url, &[])
        .await
        .map_err(|e| FeedError::FetchFailed {
            url: url.to_string(),
            source: e,
        })
}

/// Fetch and parse a podcast feed from a URL
pub async fn fetch_feed<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Vec<EpisodeRecord>, FeedError> {
    let feed_url = Url::parse(url)?;
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes, &feed_url)
}

/// Episode source reading a show's RSS feed document
#[derive(Clone)]
pub struct FeedSource<C> {
    client: C,
}

impl<C: HttpClient> FeedSource<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient> EpisodeSource for FeedSource<C> {
    async fn list_episodes(
        &self,
        show: &ShowConfig,
        since: i64,
        max_count: usize,
    ) -> Result<Vec<EpisodeRecord>, FeedError> {
        let ShowSource::Feed(url) = &show.source else {
            return Err(FeedError::UnsupportedSource {
                show: show.name.clone(),
            });
        };

        let episodes = fetch_feed(&self.client, url).await?;
        Ok(select_newest(episodes, since, max_count))
    }
}
