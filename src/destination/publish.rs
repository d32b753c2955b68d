// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::episode::is_episode_file;
use crate::error::DestinationError;

/// Move every staged file of a category to the destination, then remove the
/// staging category directory.
///
/// Returns the number of files moved. A missing staging directory is not an
/// error (nothing was downloaded for that category).
pub fn publish(
    staging_category_dir: &Path,
    destination_category_dir: &Path,
) -> Result<usize, DestinationError> {
    if !staging_category_dir.is_dir() {
        return Ok(0);
    }

    std::fs::create_dir_all(destination_category_dir).map_err(|e| {
        DestinationError::CreateDirectoryFailed {
            path: destination_category_dir.to_path_buf(),
            source: e,
        }
    })?;

    let mut moved = 0;
    for source in staged_files(staging_category_dir)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = destination_category_dir.join(name);

        move_file(&source, &target)?;
        debug!(from = %source.display(), to = %target.display(), "Published episode");
        moved += 1;
    }

    std::fs::remove_dir_all(staging_category_dir).map_err(|e| DestinationError::RemoveFailed {
        path: staging_category_dir.to_path_buf(),
        source: e,
    })?;

    info!(
        moved,
        destination = %destination_category_dir.display(),
        "Published staged episodes"
    );
    Ok(moved)
}

/// Finished episode files in a staging directory, sorted by name.
///
/// In-progress downloads and audio work files are left out.
pub fn staged_files(staging_category_dir: &Path) -> Result<Vec<PathBuf>, DestinationError> {
    let read_err = |e| DestinationError::ReadDirectoryFailed {
        path: staging_category_dir.to_path_buf(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(staging_category_dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        let is_episode = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_episode_file);

        if path.is_file() && is_episode {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Rename, or copy and delete when source and target are on different devices
fn move_file(source: &Path, target: &Path) -> Result<(), DestinationError> {
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }

    let move_err = |e| DestinationError::MoveFailed {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };

    std::fs::copy(source, target).map_err(move_err)?;
    std::fs::remove_file(source).map_err(move_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn publish_moves_files_and_clears_staging() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging/Finance");
        let dest = dir.path().join("dest/Finance");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("A - One.mp3"), b"one").unwrap();
        std::fs::write(staging.join("B - Two.mp3"), b"two").unwrap();

        let moved = publish(&staging, &dest).unwrap();

        assert_eq!(moved, 2);
        assert_eq!(std::fs::read(dest.join("A - One.mp3")).unwrap(), b"one");
        assert_eq!(std::fs::read(dest.join("B - Two.mp3")).unwrap(), b"two");
        assert!(!staging.exists());
    }

    #[test]
    fn publish_keeps_existing_destination_files() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging/Music");
        let dest = dir.path().join("dest/Music");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("Old - Episode.mp3"), b"old").unwrap();
        std::fs::write(staging.join("New - Episode.mp3"), b"new").unwrap();

        publish(&staging, &dest).unwrap();

        assert!(dest.join("Old - Episode.mp3").exists());
        assert!(dest.join("New - Episode.mp3").exists());
    }

    #[test]
    fn publish_without_staging_dir_is_noop() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("dest/Heroic");

        assert_eq!(publish(&dir.path().join("missing"), &dest).unwrap(), 0);
        assert!(!dest.exists());
    }

    #[test]
    fn publish_skips_partial_downloads() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging/Cat");
        let dest = dir.path().join("dest/Cat");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("S - Ep.mp3.partial"), b"half").unwrap();

        assert_eq!(publish(&staging, &dest).unwrap(), 0);
        assert!(!dest.join("S - Ep.mp3.partial").exists());
    }

    #[test]
    fn interrupted_work_file_never_replaces_episode_on_device() {
        let dir = tempdir().unwrap();
        let staging = dir.path().join("staging/Cat");
        let dest = dir.path().join("dest/Cat");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("Show - Ep.mp3"), b"episode").unwrap();
        std::fs::write(staging.join("Show - Ep.mp3.processing"), b"half").unwrap();

        let moved = publish(&staging, &dest).unwrap();
        crate::destination::prune(&dest, "Show", 1).unwrap();

        assert_eq!(moved, 1);
        let remaining: Vec<_> = std::fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining, vec!["Show - Ep.mp3"]);
    }

    #[test]
    fn staged_files_are_sorted() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();

        let files = staged_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3"]);
    }
}
