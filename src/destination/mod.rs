// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod publish;
mod retention;

use std::path::Path;
use std::time::{Duration, Instant};

use crate::progress::{ProgressEvent, SharedProgressReporter};

pub use publish::{publish, staged_files};
pub use retention::{prune, show_episodes};

/// Whether the removable device is mounted at `root`
pub fn is_mounted(root: &Path) -> bool {
    root.is_dir()
}

/// Poll until `root` is mounted or `timeout` elapses.
///
/// Returns whether the destination is mounted at the end of the wait.
pub async fn wait_for_destination(
    root: &Path,
    timeout: Duration,
    poll_interval: Duration,
    reporter: &SharedProgressReporter,
) -> bool {
    let started = Instant::now();

    loop {
        if is_mounted(root) {
            return true;
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return false;
        }

        reporter.report(ProgressEvent::WaitingForDestination {
            path: root.to_path_buf(),
            elapsed_secs: elapsed.as_secs(),
            timeout_secs: timeout.as_secs(),
        });
        tokio::time::sleep(poll_interval.min(timeout - elapsed)).await;
    }
}
