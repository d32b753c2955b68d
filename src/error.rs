// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or validating the show table
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read show table {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse show table {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Show table is empty")]
    NoShows,

    #[error("Show name must not be empty")]
    EmptyName,

    #[error("Duplicate show name '{0}'")]
    DuplicateName(String),

    #[error("Show '{name}' has no category")]
    EmptyCategory { name: String },

    #[error("Show '{name}' must retain at least one episode")]
    ZeroRetention { name: String },

    #[error("Show '{name}' has invalid playback speed {speed}")]
    InvalidSpeed { name: String, speed: f64 },
}

/// Errors that can occur when listing episodes from a source
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to fetch feed from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse RSS feed: {0}")]
    ParseFailed(#[from] rss::Error),

    #[error("Failed to parse index API response: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("Index API reported failure: {0}")]
    ApiStatus(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Podcast Index credentials are not configured")]
    MissingCredentials,

    #[error("Show '{show}' is not served by this source")]
    UnsupportedSource { show: String },

    #[error("Episode '{title}' has no enclosure (audio file)")]
    MissingEnclosure { title: String },

    #[error("Episode '{title}' has no usable publication date")]
    MissingDate { title: String },
}

/// Errors that can occur during episode downloads
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Downloaded file is too small ({size} bytes), discarded")]
    TooSmall { size: u64 },
}

/// Errors raised by the audio backend
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to run {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code}: {message}")]
    CommandFailed {
        program: String,
        code: i32,
        message: String,
    },

    #[error("Could not determine duration of {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Failed to replace {path}: {source}")]
    ReplaceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when reading or writing the run watermark
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read watermark file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write watermark file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {0} was unmounted before the watermark could be stored")]
    DestinationGone(PathBuf),
}

/// Errors that can occur while publishing to or pruning the destination
#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} to {to}: {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a pipeline run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("State error: {0}")]
    State(#[from] StateError),
}
