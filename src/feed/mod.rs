// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod fetch;
mod index_api;
mod parse;
mod source;

pub use fetch::{FeedSource, fetch_feed, fetch_feed_bytes};
pub use index_api::{IndexApiSource, IndexCredentials, PODCAST_INDEX_BASE_URL, auth_signature};
pub use parse::parse_feed;
pub use source::{EpisodeRecord, EpisodeSource, RetryPolicy, list_episodes_with_retry};
