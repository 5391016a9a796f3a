//! Cross-process locking with OS advisory file locks.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use log::{debug, info};

use crate::error::{GlaiveError, Result};
use crate::lock::{HeldLock, LockFactory, LockHandle, WRITE_LOCK_NAME};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lock factory backed by an exclusive advisory lock on `write.lock`.
///
/// The lock file itself is left in place after release; only the OS lock on
/// it matters, so a crashed process never leaves a stale lock behind.
#[derive(Debug, Clone, Default)]
pub struct FsLockFactory {
    /// How long to keep retrying a contended lock; `None` fails at once.
    timeout: Option<Duration>,
}

impl FsLockFactory {
    /// Create a factory that fails immediately on contention.
    pub fn new() -> Self {
        FsLockFactory { timeout: None }
    }

    /// Create a factory that retries for up to `timeout` before failing.
    pub fn with_timeout(timeout: Duration) -> Self {
        FsLockFactory {
            timeout: Some(timeout),
        }
    }

    fn open_lock_file(index_path: &Path) -> Result<(PathBuf, File)> {
        if !index_path.exists() {
            std::fs::create_dir_all(index_path)?;
        }
        let lock_path = index_path.join(WRITE_LOCK_NAME);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        Ok((lock_path, file))
    }
}

impl LockFactory for FsLockFactory {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn acquire_write_lock(&self, index_path: &Path) -> Result<LockHandle> {
        let (lock_path, file) = Self::open_lock_file(index_path)?;
        let started = Instant::now();

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    info!("Acquired write lock {}", lock_path.display());
                    return Ok(LockHandle::new(
                        index_path.to_path_buf(),
                        Box::new(FsLock { file, lock_path }),
                    ));
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    let waited_out = self
                        .timeout
                        .is_none_or(|timeout| started.elapsed() >= timeout);
                    if waited_out {
                        return Err(GlaiveError::lock_contention(format!(
                            "write lock {} is held by another writer",
                            lock_path.display()
                        )));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_locked(&self, index_path: &Path) -> Result<bool> {
        let lock_path = index_path.join(WRITE_LOCK_NAME);
        if !lock_path.exists() {
            return Ok(false);
        }
        let file = OpenOptions::new().read(true).write(true).open(&lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                file.unlock()?;
                Ok(false)
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
struct FsLock {
    file: File,
    lock_path: PathBuf,
}

impl HeldLock for FsLock {
    fn release(&mut self) -> Result<()> {
        self.file.unlock()?;
        debug!("Unlocked {}", self.lock_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_contention() {
        let temp_dir = TempDir::new().unwrap();
        let factory = FsLockFactory::new();

        let _first = factory.acquire_write_lock(temp_dir.path()).unwrap();
        assert!(factory.is_locked(temp_dir.path()).unwrap());

        let err = factory.acquire_write_lock(temp_dir.path()).unwrap_err();
        assert!(err.is_lock_contention());
    }

    #[test]
    fn test_release_allows_reacquire() {
        let temp_dir = TempDir::new().unwrap();
        let factory = FsLockFactory::new();

        let mut handle = factory.acquire_write_lock(temp_dir.path()).unwrap();
        handle.release().unwrap();
        assert!(!factory.is_locked(temp_dir.path()).unwrap());

        let handle = factory.acquire_write_lock(temp_dir.path()).unwrap();
        drop(handle);
        assert!(!factory.is_locked(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_bounded_wait_gives_up() {
        let temp_dir = TempDir::new().unwrap();
        let holder = FsLockFactory::new();
        let _held = holder.acquire_write_lock(temp_dir.path()).unwrap();

        let waiting = FsLockFactory::with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = waiting.acquire_write_lock(temp_dir.path()).unwrap_err();

        assert!(err.is_lock_contention());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_bounded_wait_succeeds_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();
        let held = FsLockFactory::new().acquire_write_lock(&path).unwrap();

        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(held);
        });

        let waiting = FsLockFactory::with_timeout(Duration::from_secs(5));
        assert!(waiting.acquire_write_lock(&path).is_ok());
        releaser.join().unwrap();
    }
}
