// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod filename;

pub use download::{EpisodePaths, FetchOutcome, check_episode, download_episode, fetch_episode};
pub use filename::{
    EPISODE_EXTENSION, episode_filename, is_episode_file, sanitize_show_name, sanitize_title,
    show_prefix,
};
