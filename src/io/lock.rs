//! Cross-process write lock for a snapshot store directory.
//!
//! Writers take an exclusive `flock` on `<dir>/.lock`. The lock file is
//! permanent: every writer must lock the same inode, so releasing the lock
//! only unlocks and closes the handle and never unlinks the file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

pub const LOCK_FILE: &str = ".lock";

/// How long a snapshot write waits for another `tf` process
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_RETRY: Duration = Duration::from_millis(5);
const MAX_RETRY: Duration = Duration::from_millis(50);

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("could not lock {path}: {source}")]
    Flock { path: PathBuf, source: io::Error },
    #[error("could not lock {path}: another tf process is writing the workspace")]
    Timeout { path: PathBuf },
}

/// Exclusive hold on a store directory, released on drop
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the lock if nobody holds it. `Ok(None)` means it is busy.
    pub fn try_acquire(dir: &Path) -> Result<Option<Self>, LockError> {
        let (path, file) = open_lock_file(dir)?;
        Ok(lock_or_busy(&file, &path)?.then_some(StoreLock { file, path }))
    }

    /// Take the lock, polling with a growing interval until `timeout` has
    /// passed.
    pub fn acquire(dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let (path, file) = open_lock_file(dir)?;
        let deadline = Instant::now() + timeout;
        let mut wait = FIRST_RETRY;
        loop {
            if lock_or_busy(&file, &path)? {
                return Ok(StoreLock { file, path });
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::Timeout { path });
            }
            thread::sleep(wait.min(remaining));
            wait = (wait * 2).min(MAX_RETRY);
        }
    }

    pub fn acquire_default(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Closing the handle would release it too
        let _ = sys::unlock(&self.file);
    }
}

fn open_lock_file(dir: &Path) -> Result<(PathBuf, File), LockError> {
    let path = dir.join(LOCK_FILE);
    let opened = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path);
    match opened {
        Ok(file) => Ok((path, file)),
        Err(source) => Err(LockError::Open { path, source }),
    }
}

/// `true` once locked, `false` when another handle holds the lock
fn lock_or_busy(file: &File, path: &Path) -> Result<bool, LockError> {
    match sys::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => Ok(false),
        Err(source) => Err(LockError::Flock {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
        // SAFETY: the descriptor stays open for as long as `file` is borrowed
        if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    pub fn try_lock_exclusive(file: &File) -> io::Result<()> {
        flock(file, libc::LOCK_EX | libc::LOCK_NB)
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        flock(file, libc::LOCK_UN)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    pub fn try_lock_exclusive(_file: &File) -> io::Result<()> {
        Ok(())
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHORT: Duration = Duration::from_millis(60);

    #[test]
    fn release_keeps_lock_file() {
        let tmp = TempDir::new().unwrap();
        let lock = StoreLock::acquire_default(tmp.path()).unwrap();
        let path = lock.path().to_path_buf();
        drop(lock);
        assert!(path.exists());
        assert!(StoreLock::try_acquire(tmp.path()).unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn second_writer_times_out() {
        let tmp = TempDir::new().unwrap();
        let _held = StoreLock::acquire_default(tmp.path()).unwrap();
        assert!(StoreLock::try_acquire(tmp.path()).unwrap().is_none());
        assert!(matches!(
            StoreLock::acquire(tmp.path(), SHORT),
            Err(LockError::Timeout { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn waiter_and_newcomer_share_one_lock_file() {
        let tmp = TempDir::new().unwrap();
        let first = StoreLock::acquire_default(tmp.path()).unwrap();
        // A waiter opened the file before the first writer let go
        let (path, waiter) = open_lock_file(tmp.path()).unwrap();
        assert!(!lock_or_busy(&waiter, &path).unwrap());
        drop(first);
        assert!(lock_or_busy(&waiter, &path).unwrap());

        assert!(matches!(
            StoreLock::acquire(tmp.path(), SHORT),
            Err(LockError::Timeout { .. })
        ));
        drop(waiter);
        assert!(StoreLock::acquire(tmp.path(), SHORT).is_ok());
    }

    #[test]
    fn missing_directory_is_an_open_error() {
        let tmp = TempDir::new().unwrap();
        let err = StoreLock::acquire_default(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, LockError::Open { .. }));
    }
}
