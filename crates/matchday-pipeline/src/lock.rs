//! Cross-process pipeline lock
//!
//! A single marker file guards every entrypoint (scheduled run, rebuild,
//! standalone stage commands). Presence means a run is in progress somewhere.
//! Creation uses exclusive-create, so two processes can never both observe
//! "absent" and proceed.
//!
//! ```no_run
//! use matchday_pipeline::lock::PipelineLock;
//!
//! # fn main() -> matchday_pipeline::error::PipelineResult<()> {
//! let lock = PipelineLock::new("./data/football/.refresh.lock");
//! if !lock.acquire(true)? {
//!     return Ok(()); // someone else is running
//! }
//! let _guard = lock.scoped();
//! // ... work; the marker is removed when `_guard` drops, even on error
//! # Ok(())
//! # }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct PipelineLock {
    path: PathBuf,
}

impl PipelineLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to create the marker.
    ///
    /// Returns `Ok(false)` when the marker already exists; nothing is
    /// modified in that case. `fail_if_exists` only controls whether the
    /// existence check runs before the create attempt. The exclusive create
    /// refuses an existing marker either way, so a held lock is never
    /// acquired twice.
    ///
    /// Any failure other than "already exists" is returned as
    /// [`PipelineError::Lock`], which is fatal to the caller.
    pub fn acquire(&self, fail_if_exists: bool) -> PipelineResult<bool> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.lock_error("create directory for", e))?;
        }

        if fail_if_exists && self.path.exists() {
            debug!(path = %self.path.display(), "Pipeline lock already held");
            return Ok(false);
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                // Owner details are informational; the marker's existence is the lock
                let _ = writeln!(
                    file,
                    "pid={} acquired_at={}",
                    std::process::id(),
                    chrono::Utc::now().to_rfc3339()
                );
                debug!(path = %self.path.display(), "Acquired pipeline lock");
                Ok(true)
            }
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "Pipeline lock already held");
                Ok(false)
            }
            Err(e) => Err(self.lock_error("create", e)),
        }
    }

    /// Remove the marker. A missing marker is not an error.
    pub fn release(&self) -> PipelineResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Released pipeline lock");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.lock_error("remove", e)),
        }
    }

    /// Guard that releases the marker when dropped.
    ///
    /// Takes no new state: call [`acquire`](Self::acquire) first and only
    /// enter the guarded block when it returned `true`.
    pub fn scoped(&self) -> LockGuard<'_> {
        LockGuard { lock: self }
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Whether the marker is older than `max_age`.
    ///
    /// Diagnostic only; never used to break a lock automatically.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age().is_some_and(|age| age > max_age)
    }

    /// Time since the marker was last modified, if it exists
    pub fn age(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        SystemTime::now().duration_since(modified).ok()
    }

    fn lock_error(&self, action: &str, err: std::io::Error) -> PipelineError {
        PipelineError::Lock(format!(
            "failed to {} lock file {}: {}",
            action,
            self.path.display(),
            err
        ))
    }
}

/// Releases the pipeline lock on every exit path, including unwinding
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a PipelineLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        match self.lock.release() {
            Ok(()) => info!(path = %self.lock.path.display(), "Pipeline lock released"),
            Err(e) => warn!(error = %e, "Failed to release pipeline lock"),
        }
    }
}
