// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Episode listings from the Podcast Index API.
//!
//! Requests are signed with the API key, the request time and
//! `sha1(key + secret + time)` as described by the Podcast Index docs.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;
use url::Url;

use crate::config::{ShowConfig, ShowSource};
use crate::error::FeedError;
use crate::http::HttpClient;

use super::source::{EpisodeRecord, EpisodeSource, select_newest};

/// Production endpoint of the Podcast Index API
pub const PODCAST_INDEX_BASE_URL: &str = "https://api.podcastindex.org/api/1.0/";

/// API key pair issued by Podcast Index
#[derive(Clone)]
pub struct IndexCredentials {
    pub key: String,
    pub secret: String,
}

impl std::fmt::Debug for IndexCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    #[serde(default)]
    status: serde_json::Value,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    items: Vec<IndexEpisode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEpisode {
    #[serde(default)]
    title: String,
    #[serde(default)]
    date_published: i64,
    #[serde(default)]
    enclosure_url: String,
}

/// Compute the `Authorization` header value for a request made at `timestamp`
pub fn auth_signature(key: &str, secret: &str, timestamp: i64) -> String {
    let digest = Sha1::digest(format!("{key}{secret}{timestamp}").as_bytes());
    format!("{:x}", digest)
}

/// Episode source backed by the Podcast Index `episodes/byfeedid` endpoint
#[derive(Clone)]
pub struct IndexApiSource<C> {
    client: C,
    credentials: IndexCredentials,
    base_url: Url,
}

impl<C: HttpClient> IndexApiSource<C> {
    pub fn new(client: C, credentials: IndexCredentials) -> Self {
        Self {
            client,
            credentials,
            base_url: Url::parse(PODCAST_INDEX_BASE_URL).expect("valid base URL"),
        }
    }

    /// Point the source at a different API root (must end with `/`)
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn request_url(&self, feed_id: u64, since: i64, max_count: usize) -> Result<Url, FeedError> {
        let mut url = self.base_url.join("episodes/byfeedid")?;
        url.query_pairs_mut()
            .append_pair("id", &feed_id.to_string())
            .append_pair("max", &max_count.max(1).to_string());
        if since > 0 {
            url.query_pairs_mut()
                .append_pair("since", &since.to_string());
        }
        Ok(url)
    }

    fn auth_headers(&self, now: i64) -> Vec<(&'static str, String)> {
        vec![
            ("X-Auth-Key", self.credentials.key.clone()),
            ("X-Auth-Date", now.to_string()),
            (
                "Authorization",
                auth_signature(&self.credentials.key, &self.credentials.secret, now),
            ),
        ]
    }
}

/// Parse an `episodes/byfeedid` response body into records
fn parse_episodes_response(body: &[u8]) -> Result<Vec<EpisodeRecord>, FeedError> {
    let response: EpisodesResponse = serde_json::from_slice(body)?;

    let ok = match &response.status {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    if !ok {
        return Err(FeedError::ApiStatus(
            response
                .description
                .unwrap_or_else(|| "unknown error".to_string()),
        ));
    }

    let records = response
        .items
        .into_iter()
        .filter_map(|item| {
            let url = match Url::parse(&item.enclosure_url) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Skipping index episode '{}': {}", item.title, e);
                    return None;
                }
            };
            if item.date_published <= 0 {
                debug!("Skipping index episode '{}': no publication date", item.title);
                return None;
            }
            let title = if item.title.trim().is_empty() {
                "Untitled Episode".to_string()
            } else {
                item.title.trim().to_string()
            };
            Some(EpisodeRecord {
                title,
                url,
                published_at: item.date_published,
            })
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl<C: HttpClient> EpisodeSource for IndexApiSource<C> {
    async fn list_episodes(
        &self,
        show: &ShowConfig,
        since: i64,
        max_count: usize,
    ) -> Result<Vec<EpisodeRecord>, FeedError> {
        let ShowSource::PodcastIndex(feed_id) = show.source else {
            return Err(FeedError::UnsupportedSource {
                show: show.name.clone(),
            });
        };

        let url = self.request_url(feed_id, since, max_count)?;
        let headers = self.auth_headers(Utc::now().timestamp());

        let body = self
            .client
            .get_bytes(url.as_str(), &headers)
            .await
            .map_err(|e| FeedError::FetchFailed {
                url: url.to_string(),
                source: e,
            })?;

        let records = parse_episodes_response(&body)?;
        Ok(select_newest(records, since, max_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct MockHttpClient {
        body: String,
        seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(
            &self,
            url: &str,
            headers: &[(&str, String)],
        ) -> Result<Bytes, reqwest::Error> {
            self.seen.lock().unwrap().push((
                url.to_string(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ));
            Ok(Bytes::from(self.body.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("index listings are fetched whole")
        }
    }

    const RESPONSE: &str = r#"{
        "status": "true",
        "items": [
            {"title": "Older", "datePublished": 1704110400, "enclosureUrl": "https://cdn.example.com/older.mp3"},
            {"title": "Newer", "datePublished": 1704196800, "enclosureUrl": "https://cdn.example.com/newer.mp3"},
            {"title": "Broken", "datePublished": 1704196900, "enclosureUrl": ""}
        ],
        "count": 3
    }"#;

    fn source(body: &str) -> IndexApiSource<MockHttpClient> {
        IndexApiSource::new(
            MockHttpClient {
                body: body.to_string(),
                seen: Mutex::new(Vec::new()),
            },
            IndexCredentials {
                key: "KEY".to_string(),
                secret: "SECRET".to_string(),
            },
        )
    }

    #[test]
    fn signature_matches_known_digest() {
        assert_eq!(
            auth_signature("KEY", "SECRET", 1_700_000_000),
            "5f8983664e541a83aaae7f3a47f1957fbca48aec"
        );
    }

    #[test]
    fn parses_string_and_bool_status() {
        assert_eq!(parse_episodes_response(RESPONSE.as_bytes()).unwrap().len(), 2);

        let bool_status = r#"{"status": true, "items": []}"#;
        assert!(parse_episodes_response(bool_status.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn failed_status_is_an_error() {
        let body = r#"{"status": "false", "description": "Feed not found"}"#;
        match parse_episodes_response(body.as_bytes()) {
            Err(FeedError::ApiStatus(msg)) => assert_eq!(msg, "Feed not found"),
            other => panic!("Expected ApiStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lists_signed_request_newest_first() {
        let source = source(RESPONSE);
        let show = ShowConfig::podcast_index("Indexed", 920666, "Tech");

        let episodes = source.list_episodes(&show, 0, 5).await.unwrap();

        let titles: Vec<_> = episodes.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);

        let seen = source.client.seen.lock().unwrap();
        let (url, headers) = &seen[0];
        assert!(url.starts_with("https://api.podcastindex.org/api/1.0/episodes/byfeedid?"));
        assert!(url.contains("id=920666"));
        assert!(url.contains("max=5"));
        assert!(!url.contains("since="));

        let header = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(header("X-Auth-Key"), "KEY");
        let date: i64 = header("X-Auth-Date").parse().unwrap();
        assert_eq!(header("Authorization"), auth_signature("KEY", "SECRET", date));
    }

    #[tokio::test]
    async fn passes_watermark_as_since() {
        let source = source(RESPONSE);
        let show = ShowConfig::podcast_index("Indexed", 1, "Tech");

        let episodes = source.list_episodes(&show, 1_704_110_400, 5).await.unwrap();

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "Newer");
        let seen = source.client.seen.lock().unwrap();
        assert!(seen[0].0.contains("since=1704110400"));
    }

    #[tokio::test]
    async fn rejects_feed_backed_show() {
        let source = source(RESPONSE);
        let show = ShowConfig::feed("Show", "https://example.com/rss", "Cat");

        let result = source.list_episodes(&show, 0, 1).await;
        assert!(matches!(result, Err(FeedError::UnsupportedSource { .. })));
    }
}
