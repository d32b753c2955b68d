// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::info;

use crate::episode::{is_episode_file, show_prefix};
use crate::error::DestinationError;

/// A show's episode files on the destination, oldest modification first.
///
/// Files with equal modification times keep name order.
pub fn show_episodes(
    category_dir: &Path,
    show_name: &str,
) -> Result<Vec<PathBuf>, DestinationError> {
    if !category_dir.is_dir() {
        return Ok(Vec::new());
    }

    let prefix = show_prefix(show_name);
    let read_err = |e| DestinationError::ReadDirectoryFailed {
        path: category_dir.to_path_buf(),
        source: e,
    };

    let mut episodes: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(category_dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();

        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&prefix) && is_episode_file(n));
        if !matches || !path.is_file() {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(read_err)?;
        episodes.push((modified, path));
    }

    episodes.sort_by(|a, b| a.1.cmp(&b.1));
    episodes.sort_by_key(|(modified, _)| *modified);

    Ok(episodes.into_iter().map(|(_, path)| path).collect())
}

/// Delete a show's oldest episodes until at most `max_episodes` remain.
///
/// Returns the removed paths.
pub fn prune(
    category_dir: &Path,
    show_name: &str,
    max_episodes: usize,
) -> Result<Vec<PathBuf>, DestinationError> {
    let episodes = show_episodes(category_dir, show_name)?;
    let excess = episodes.len().saturating_sub(max_episodes);

    let mut removed = Vec::with_capacity(excess);
    for path in episodes.into_iter().take(excess) {
        std::fs::remove_file(&path).map_err(|e| DestinationError::RemoveFailed {
            path: path.clone(),
            source: e,
        })?;
        info!(show = show_name, path = %path.display(), "Removed old episode");
        removed.push(path);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_with_mtime(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    fn remaining(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn prune_keeps_only_newest_when_limit_is_one() {
        let dir = tempdir().unwrap();
        write_with_mtime(dir.path(), "Show - Old.mp3", 7200);
        write_with_mtime(dir.path(), "Show - New.mp3", 60);

        let removed = prune(dir.path(), "Show", 1).unwrap();

        assert_eq!(removed.len(), 1);
        assert!(removed[0].ends_with("Show - Old.mp3"));
        assert_eq!(remaining(dir.path()), vec!["Show - New.mp3"]);
    }

    #[test]
    fn prune_removes_oldest_first() {
        let dir = tempdir().unwrap();
        write_with_mtime(dir.path(), "Show - A.mp3", 100);
        write_with_mtime(dir.path(), "Show - B.mp3", 400);
        write_with_mtime(dir.path(), "Show - C.mp3", 300);
        write_with_mtime(dir.path(), "Show - D.mp3", 200);

        prune(dir.path(), "Show", 2).unwrap();

        assert_eq!(remaining(dir.path()), vec!["Show - A.mp3", "Show - D.mp3"]);
    }

    #[test]
    fn prune_leaves_min_of_existing_and_limit() {
        let dir = tempdir().unwrap();
        write_with_mtime(dir.path(), "Show - A.mp3", 100);
        write_with_mtime(dir.path(), "Show - B.mp3", 200);

        let removed = prune(dir.path(), "Show", 5).unwrap();

        assert!(removed.is_empty());
        assert_eq!(remaining(dir.path()).len(), 2);
    }

    #[test]
    fn prune_ignores_other_shows_in_category() {
        let dir = tempdir().unwrap();
        write_with_mtime(dir.path(), "Show - Old.mp3", 500);
        write_with_mtime(dir.path(), "Show - New.mp3", 10);
        write_with_mtime(dir.path(), "Show Extra - Ancient.mp3", 9000);
        write_with_mtime(dir.path(), "Other - Ancient.mp3", 9000);

        prune(dir.path(), "Show", 1).unwrap();

        assert_eq!(
            remaining(dir.path()),
            vec!["Other - Ancient.mp3", "Show - New.mp3", "Show Extra - Ancient.mp3"]
        );
    }

    #[test]
    fn prune_ignores_work_files_of_the_show() {
        let dir = tempdir().unwrap();
        write_with_mtime(dir.path(), "Show - Ep.mp3", 500);
        write_with_mtime(dir.path(), "Show - Ep.mp3.processing", 10);

        let removed = prune(dir.path(), "Show", 1).unwrap();

        assert!(removed.is_empty());
        assert_eq!(show_episodes(dir.path(), "Show").unwrap().len(), 1);
    }

    #[test]
    fn prune_on_missing_directory_is_noop() {
        let dir = tempdir().unwrap();
        assert!(prune(&dir.path().join("absent"), "Show", 1).unwrap().is_empty());
    }

    #[test]
    fn equal_mtimes_resolve_by_name() {
        let dir = tempdir().unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(1000);
        for name in ["Show - B.mp3", "Show - A.mp3"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"x").unwrap();
            File::options()
                .write(true)
                .open(&path)
                .unwrap()
                .set_modified(mtime)
                .unwrap();
        }

        let episodes = show_episodes(dir.path(), "Show").unwrap();
        assert!(episodes[0].ends_with("Show - A.mp3"));
        assert!(episodes[1].ends_with("Show - B.mp3"));
    }
}
