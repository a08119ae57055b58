//! Best-effort cleanup of the shared scratch directory.
//!
//! Downloads are deleted as soon as their response body is dropped, but a
//! crashed request or a failed primary attempt can leave files behind. The
//! sweep runs on every metadata request and removes anything older than an
//! hour.

use std::fs::{self, Metadata};
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

pub const MAX_SCRATCH_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Deletes regular files in `dir` last modified more than an hour ago.
///
/// Never fails; problems are logged and counted.
pub fn sweep(dir: &Path) -> SweepReport {
    sweep_at(dir, SystemTime::now(), MAX_SCRATCH_AGE)
}

/// Same as [`sweep`] with an explicit clock, for tests.
pub fn sweep_at(dir: &Path, now: SystemTime, max_age: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), "could not scan scratch directory: {err}");
            return report;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(dir = %dir.display(), "could not read scratch entry: {err}");
                report.failed += 1;
                continue;
            }
        };
        sweep_entry(&entry.path(), entry.metadata(), now, max_age, &mut report);
    }

    report
}

/// Handles one listed entry. The file may already be gone by the time it is
/// stat'ed or removed; a concurrent download deletes its own file.
fn sweep_entry(
    path: &Path,
    metadata: io::Result<Metadata>,
    now: SystemTime,
    max_age: Duration,
    report: &mut SweepReport,
) {
    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return,
        Err(err) => {
            warn!(path = %path.display(), "could not stat scratch file: {err}");
            report.failed += 1;
            return;
        }
    };
    if !metadata.is_file() {
        return;
    }

    let modified = match metadata.modified() {
        Ok(modified) => modified,
        Err(err) => {
            warn!(path = %path.display(), "could not read modification time: {err}");
            report.failed += 1;
            return;
        }
    };
    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    if age <= max_age {
        return;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "removed stale scratch file");
            report.removed += 1;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), "could not remove stale scratch file: {err}");
            report.failed += 1;
        }
    }
}
