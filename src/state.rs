// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::destination::is_mounted;
use crate::error::StateError;

/// Name of the watermark file at the destination root
pub const WATERMARK_FILENAME: &str = "podcast_downloader_last_run.txt";

/// Minimum age of the watermark before a privileged run proceeds
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);

/// The "last successful run" timestamp.
///
/// Stored on the destination while it is mounted, otherwise at a local
/// fallback path. The two files are independent; neither is copied to the
/// other. The location is chosen once, when the store is created, so a run
/// reads and commits the same file.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    destination_root: PathBuf,
    path: PathBuf,
    on_destination: bool,
}

impl WatermarkStore {
    pub fn new(destination_root: impl Into<PathBuf>, fallback_path: impl Into<PathBuf>) -> Self {
        let destination_root = destination_root.into();
        let on_destination = is_mounted(&destination_root);
        let path = if on_destination {
            destination_root.join(WATERMARK_FILENAME)
        } else {
            fallback_path.into()
        };

        Self {
            destination_root,
            path,
            on_destination,
        }
    }

    /// The file this store reads and commits
    pub fn location(&self) -> &Path {
        &self.path
    }

    /// Read the watermark in epoch seconds, 0 if none was recorded yet
    pub fn read(&self) -> Result<i64, StateError> {
        read_watermark_file(&self.path)
    }

    /// Persist `now` as the new watermark and return the previous one.
    ///
    /// Fails if the store was opened on the destination and the device has
    /// since gone away.
    pub fn commit(&self, now: i64) -> Result<i64, StateError> {
        if self.on_destination && !is_mounted(&self.destination_root) {
            return Err(StateError::DestinationGone(self.destination_root.clone()));
        }

        let previous = read_watermark_file(&self.path)?;
        write_watermark_file(&self.path, now, !self.on_destination)?;
        debug!(path = %self.path.display(), previous, now, "Watermark committed");
        Ok(previous)
    }
}

/// Read the watermark for `destination_root`, falling back to `fallback_path`
pub fn read_watermark(destination_root: &Path, fallback_path: &Path) -> Result<i64, StateError> {
    WatermarkStore::new(destination_root, fallback_path).read()
}

/// Store `now` as the watermark for `destination_root`; returns the previous value
pub fn commit_watermark(
    destination_root: &Path,
    fallback_path: &Path,
    now: i64,
) -> Result<i64, StateError> {
    WatermarkStore::new(destination_root, fallback_path).commit(now)
}

fn read_watermark_file(path: &Path) -> Result<i64, StateError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(StateError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    match content.trim().parse::<i64>() {
        Ok(value) if value >= 0 => Ok(value),
        _ => {
            warn!(
                path = %path.display(),
                "Watermark file does not hold an epoch timestamp, treating as first run"
            );
            Ok(0)
        }
    }
}

fn write_watermark_file(path: &Path, value: i64, create_parent: bool) -> Result<(), StateError> {
    let tmp = path.with_extension("txt.tmp");
    let write_err = |e| StateError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if create_parent && let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(&tmp, value.to_string()).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)
}

/// Whether a run should be skipped because the last one was too recent
pub fn should_throttle(watermark: i64, now: i64, window: Duration) -> bool {
    watermark > 0 && now.saturating_sub(watermark) < window.as_secs() as i64
}

/// Whether the process runs with root's effective user id
#[cfg(unix)]
pub fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_elevated() -> bool {
    false
}
