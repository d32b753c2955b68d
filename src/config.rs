// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::feed::{IndexCredentials, RetryPolicy};

/// Default mount point of the swim headphones' storage
pub const DEFAULT_DESTINATION_ROOT: &str = "/Volumes/OpenSwim";

/// Default local working area for downloads and processing
pub const DEFAULT_STAGING_ROOT: &str = "/tmp/OpenSwim";

/// Watermark location used while the destination is not mounted
pub const DEFAULT_WATERMARK_FALLBACK: &str = "/tmp/podcast_downloader_last_run.txt";

/// Downloads smaller than this are treated as corrupt
pub const MIN_EPISODE_BYTES: u64 = 1024;

/// Where a show's episode list comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowSource {
    /// An RSS feed document URL
    Feed(String),
    /// A Podcast Index feed id
    PodcastIndex(u64),
}

impl std::fmt::Display for ShowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feed(url) => write!(f, "{url}"),
            Self::PodcastIndex(id) => write!(f, "podcastindex:{id}"),
        }
    }
}

/// Static configuration of one podcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowConfig {
    /// Unique show name, also the filename prefix of its episodes
    pub name: String,
    pub source: ShowSource,
    /// Folder on the destination grouping several shows
    pub category: String,
    /// How many episodes of this show are kept on the destination
    #[serde(default = "default_max_episodes")]
    pub max_episodes: usize,
    #[serde(default)]
    pub trim_start_secs: u32,
    #[serde(default)]
    pub trim_end_secs: u32,
    /// Playback speed multiplier, 1.0 leaves the tempo alone
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_max_episodes() -> usize {
    1
}

fn default_speed() -> f64 {
    1.0
}

impl ShowConfig {
    /// A feed-backed show with default retention, no trimming and normal speed
    pub fn feed(name: &str, url: &str, category: &str) -> Self {
        Self::new(name, ShowSource::Feed(url.to_string()), category)
    }

    /// A Podcast Index backed show with default settings
    pub fn podcast_index(name: &str, feed_id: u64, category: &str) -> Self {
        Self::new(name, ShowSource::PodcastIndex(feed_id), category)
    }

    fn new(name: &str, source: ShowSource, category: &str) -> Self {
        Self {
            name: name.to_string(),
            source,
            category: category.to_string(),
            max_episodes: default_max_episodes(),
            trim_start_secs: 0,
            trim_end_secs: 0,
            speed: default_speed(),
        }
    }

    pub fn keep(mut self, max_episodes: usize) -> Self {
        self.max_episodes = max_episodes;
        self
    }

    pub fn trim(mut self, start_secs: u32, end_secs: u32) -> Self {
        self.trim_start_secs = start_secs;
        self.trim_end_secs = end_secs;
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }
}

/// The built-in show table
pub fn default_shows() -> Vec<ShowConfig> {
    vec![
        ShowConfig::feed("FT News Briefing", "https://rss.acast.com/ftnewsbriefing", "Finance")
            .trim(30, 80)
            .speed(1.4),
        ShowConfig::feed(
            "Goldman Sachs The Markets",
            "https://feeds.megaphone.fm/GLD9322922848",
            "Finance",
        )
        .trim(10, 25)
        .speed(1.4),
        ShowConfig::feed(
            "Unhedged",
            "https://feeds.acast.com/public/shows/6478a825654260001190a7cb",
            "Finance",
        )
        .trim(30, 45)
        .speed(1.4),
        ShowConfig::feed(
            "Ben Greenfield Life",
            "https://www.omnycontent.com/d/playlist/e58478bf-2dc2-4cb0-b7e9-afb301219b9a/3e7cc436-2b1b-42c0-9170-afc701069980/5ba357f9-00a2-4cfb-ad41-afc7010699a1/podcast.rss",
            "BioHack",
        )
        .trim(305, 0)
        .speed(1.5),
        ShowConfig::feed(
            "The Human Upgrade with Dave Asprey",
            "https://rss.art19.com/human-upgrade",
            "BioHack",
        )
        .trim(150, 0)
        .speed(1.5),
        ShowConfig::feed(
            "Heroic with Brian Johnson",
            "https://brianjohnson.libsyn.com/rss",
            "Heroic",
        )
        .trim(15, 30),
        ShowConfig::feed("The Daily Dad", "https://feeds.buzzsprout.com/424261.rss", "Heroic")
            .trim(30, 80),
        ShowConfig::feed("The Daily Stoic", "https://rss.art19.com/the-daily-stoic", "Heroic")
            .trim(30, 0),
        ShowConfig::feed(
            "Deep House Moscow",
            "https://feeds.soundcloud.com/users/soundcloud:users:164601864/sounds.rss",
            "Music",
        ),
        ShowConfig::feed(
            "Heldeep Radio",
            "https://oliverheldens.podtree.com/feed/podcast/",
            "Music",
        )
        .trim(45, 0),
    ]
}

/// Load a show table from a JSON file and validate it
pub fn load_shows(path: &Path) -> Result<Vec<ShowConfig>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let shows: Vec<ShowConfig> =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    validate_shows(&shows)?;
    Ok(shows)
}

/// Check the invariants the pipeline relies on
pub fn validate_shows(shows: &[ShowConfig]) -> Result<(), ConfigError> {
    if shows.is_empty() {
        return Err(ConfigError::NoShows);
    }

    let mut seen = HashSet::new();
    for show in shows {
        if show.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !seen.insert(show.name.as_str()) {
            return Err(ConfigError::DuplicateName(show.name.clone()));
        }
        if show.category.trim().is_empty() {
            return Err(ConfigError::EmptyCategory {
                name: show.name.clone(),
            });
        }
        if show.max_episodes == 0 {
            return Err(ConfigError::ZeroRetention {
                name: show.name.clone(),
            });
        }
        if !show.speed.is_finite() || show.speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed {
                name: show.name.clone(),
                speed: show.speed,
            });
        }
    }

    Ok(())
}

/// Everything a pipeline run needs besides the show table
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Mount point of the removable device
    pub destination_root: PathBuf,
    /// Local working area
    pub staging_root: PathBuf,
    /// Watermark file used while the destination is absent
    pub watermark_fallback: PathBuf,
    /// Smallest download accepted as a real episode
    pub min_episode_bytes: u64,
    /// Retry behaviour for episode listing
    pub retry: RetryPolicy,
    /// Podcast Index API credentials, needed only by index-backed shows
    pub index_credentials: Option<IndexCredentials>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            destination_root: PathBuf::from(DEFAULT_DESTINATION_ROOT),
            staging_root: PathBuf::from(DEFAULT_STAGING_ROOT),
            watermark_fallback: PathBuf::from(DEFAULT_WATERMARK_FALLBACK),
            min_episode_bytes: MIN_EPISODE_BYTES,
            retry: RetryPolicy::default(),
            index_credentials: None,
        }
    }
}

impl RunConfig {
    pub fn staging_category_dir(&self, show: &ShowConfig) -> PathBuf {
        self.staging_root.join(&show.category)
    }

    pub fn destination_category_dir(&self, show: &ShowConfig) -> PathBuf {
        self.destination_root.join(&show.category)
    }
}
