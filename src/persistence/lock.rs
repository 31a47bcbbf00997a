//! Cross-process advisory file locks.
//!
//! A [`FileLock`] holds an exclusive `flock` on a sidecar lock file for as
//! long as the guard lives. The protected document itself is replaced by
//! rename, so the lock must never be taken on the document path.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::{AppError, Result};

/// Pause between non-blocking acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _guard: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating the file if needed.
    ///
    /// Waits at most `timeout` for a competing holder to finish.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Lock` if the lock file cannot be opened, the wait
    /// exceeds `timeout`, or the OS rejects the lock request.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Lock(format!(
                    "failed to create lock directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|err| {
                AppError::Lock(format!("failed to open {}: {err}", path.display()))
            })?;

        let deadline = Instant::now() + timeout;
        loop {
            match try_lock(file) {
                Ok(guard) => {
                    debug!(path = %path.display(), "lock acquired");
                    return Ok(Self {
                        _guard: guard,
                        path: path.to_path_buf(),
                    });
                }
                Err(Attempt::Busy(returned)) => {
                    if Instant::now() >= deadline {
                        return Err(AppError::Lock(format!(
                            "timed out after {}ms waiting for {}",
                            timeout.as_millis(),
                            path.display()
                        )));
                    }
                    file = returned;
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(Attempt::Failed(msg)) => {
                    return Err(AppError::Lock(format!("{}: {msg}", path.display())));
                }
            }
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "lock released");
    }
}

enum Attempt {
    /// Another holder has the lock; the file handle is handed back for retry.
    Busy(File),
    Failed(String),
}

#[cfg(unix)]
fn try_lock(file: File) -> std::result::Result<nix::fcntl::Flock<File>, Attempt> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(guard) => Ok(guard),
        Err((file, Errno::EAGAIN | Errno::EINTR)) => Err(Attempt::Busy(file)),
        Err((_, errno)) => Err(Attempt::Failed(errno.desc().to_owned())),
    }
}

#[cfg(not(unix))]
fn try_lock(file: File) -> std::result::Result<File, Attempt> {
    match file.try_lock() {
        Ok(()) => Ok(file),
        Err(fs::TryLockError::WouldBlock) => Err(Attempt::Busy(file)),
        Err(fs::TryLockError::Error(err)) => Err(Attempt::Failed(err.to_string())),
    }
}
