//! Write-lock factories.
//!
//! An index admits a single writer at a time. The writer asks its
//! [`LockFactory`] for a [`LockHandle`] when it opens and keeps it until it is
//! dropped. Acquisition never queues: it either succeeds, fails immediately
//! with [`GlaiveError::LockContention`](crate::error::GlaiveError) or waits a
//! bounded time first.

pub mod fs;
pub mod no_lock;
pub mod single_instance;

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::Result;

pub use fs::FsLockFactory;
pub use no_lock::NoLockFactory;
pub use single_instance::SingleInstanceLockFactory;

/// Name of the lock file inside an index directory.
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// A source of write locks for index locations.
pub trait LockFactory: Send + Sync + fmt::Debug {
    /// Get the name of this lock factory.
    fn name(&self) -> &'static str;

    /// Acquire the write lock of the index at `index_path`.
    fn acquire_write_lock(&self, index_path: &Path) -> Result<LockHandle>;

    /// Check whether some writer currently holds the lock of `index_path`.
    fn is_locked(&self, index_path: &Path) -> Result<bool>;
}

/// A lock held by a factory implementation.
pub trait HeldLock: Send + fmt::Debug {
    /// Give the lock back.
    fn release(&mut self) -> Result<()>;
}

/// An acquired write lock; releasing happens on [`LockHandle::release`] or drop.
#[derive(Debug)]
pub struct LockHandle {
    index_path: PathBuf,
    held: Option<Box<dyn HeldLock>>,
}

impl LockHandle {
    /// Wrap a held lock.
    pub fn new(index_path: PathBuf, held: Box<dyn HeldLock>) -> Self {
        LockHandle {
            index_path,
            held: Some(held),
        }
    }

    /// The index location this lock protects.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Whether the lock has not been released yet.
    pub fn is_valid(&self) -> bool {
        self.held.is_some()
    }

    /// Release the lock. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        if let Some(mut held) = self.held.take() {
            held.release()?;
            debug!("Released write lock on {}", self.index_path.display());
        }
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                "Failed to release write lock on {}: {e}",
                self.index_path.display()
            );
        }
    }
}
