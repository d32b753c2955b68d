// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch a whole (small) response body, sending the given extra headers.
    ///
    /// Non-2xx statuses are returned as errors.
    async fn get_bytes(&self, url: &str, headers: &[(&str, String)])
    -> Result<Bytes, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Timeouts applied to every request made by [`ReqwestClient`]
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Time allowed to establish a connection
    pub connect: Duration,
    /// Maximum idle time between two reads of a response body
    pub read: Duration,
    /// Total time allowed for a metadata request (feeds, API calls)
    pub metadata: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            read: Duration::from_secs(60),
            metadata: Duration::from_secs(30),
        }
    }
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    metadata_timeout: Duration,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default timeouts
    pub fn new() -> Self {
        Self::with_timeouts(Timeouts::default())
    }

    /// Create a client whose connections and reads are bounded by `timeouts`.
    ///
    /// Downloads get no total deadline since episodes can be large; a stalled
    /// transfer is cut off by the read timeout instead.
    pub fn with_timeouts(timeouts: Timeouts) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("swimcast/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            metadata_timeout: timeouts.metadata,
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<Bytes, reqwest::Error> {
        let mut request = self.client.get(url).timeout(self.metadata_timeout);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        request.send().await?.error_for_status()?.bytes().await
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_created() {
        let _client = ReqwestClient::new();
        let _client_default = ReqwestClient::default();
        let _client_custom = ReqwestClient::with_timeouts(Timeouts {
            connect: Duration::from_secs(1),
            read: Duration::from_secs(2),
            metadata: Duration::from_secs(3),
        });
    }

    #[test]
    fn response_success_covers_2xx_only() {
        let make = |status| HttpResponse {
            status,
            content_length: None,
            body: Box::pin(futures::stream::empty()),
        };

        assert!(make(200).is_success());
        assert!(make(206).is_success());
        assert!(!make(301).is_success());
        assert!(!make(404).is_success());
        assert!(!make(500).is_success());
    }
}
