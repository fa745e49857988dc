//! Deferred removal of upload artifacts
//!
//! Uploaded sources and enhanced outputs are transient. After the
//! retention window a spawned timer deletes them best-effort: timers live
//! in-process only, so a restart forgets pending removals, and deletion
//! errors are logged and swallowed.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

/// Spawn a task that deletes `paths` after `delay`.
pub fn schedule_removal(paths: Vec<PathBuf>, delay: Duration) {
    if paths.is_empty() {
        return;
    }

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed expired upload artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "expired upload artifact already gone");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove expired upload artifact");
                }
            }
        }
    });
}
