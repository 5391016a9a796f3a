//! In-process write locks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use log::debug;
use parking_lot::Mutex;

use crate::error::{GlaiveError, Result};
use crate::lock::{HeldLock, LockFactory, LockHandle};

type LockSet = Arc<Mutex<HashSet<PathBuf>>>;

static PROCESS_LOCKS: LazyLock<LockSet> = LazyLock::new(|| Arc::new(Mutex::new(HashSet::new())));

/// Exclusivity within one process, keyed by index location.
///
/// The default instance shares a process-wide registry; [`Self::isolated`]
/// creates a factory with its own registry.
#[derive(Debug, Clone)]
pub struct SingleInstanceLockFactory {
    held: LockSet,
}

impl SingleInstanceLockFactory {
    /// Factory using the process-wide registry.
    pub fn new() -> Self {
        SingleInstanceLockFactory {
            held: Arc::clone(&PROCESS_LOCKS),
        }
    }

    /// Factory with a private registry.
    pub fn isolated() -> Self {
        SingleInstanceLockFactory {
            held: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Default for SingleInstanceLockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFactory for SingleInstanceLockFactory {
    fn name(&self) -> &'static str {
        "single_instance"
    }

    fn acquire_write_lock(&self, index_path: &Path) -> Result<LockHandle> {
        let key = index_path.to_path_buf();
        if !self.held.lock().insert(key.clone()) {
            return Err(GlaiveError::lock_contention(format!(
                "index {} is already open for writing in this process",
                index_path.display()
            )));
        }
        debug!("Acquired in-process write lock on {}", index_path.display());
        Ok(LockHandle::new(
            key.clone(),
            Box::new(InstanceLock {
                key,
                held: Arc::clone(&self.held),
            }),
        ))
    }

    fn is_locked(&self, index_path: &Path) -> Result<bool> {
        Ok(self.held.lock().contains(index_path))
    }
}

#[derive(Debug)]
struct InstanceLock {
    key: PathBuf,
    held: LockSet,
}

impl HeldLock for InstanceLock {
    fn release(&mut self) -> Result<()> {
        self.held.lock().remove(&self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_per_path() {
        let factory = SingleInstanceLockFactory::isolated();
        let a = Path::new("memory://a");
        let b = Path::new("memory://b");

        let handle = factory.acquire_write_lock(a).unwrap();
        assert!(factory.acquire_write_lock(a).unwrap_err().is_lock_contention());
        assert!(factory.acquire_write_lock(b).is_ok());
        assert!(factory.is_locked(a).unwrap());

        drop(handle);
        assert!(!factory.is_locked(a).unwrap());
        assert!(factory.acquire_write_lock(a).is_ok());
    }

    #[test]
    fn test_default_instances_share_registry() {
        let path = Path::new("memory://shared-registry-test");
        let _handle = SingleInstanceLockFactory::new()
            .acquire_write_lock(path)
            .unwrap();
        assert!(SingleInstanceLockFactory::default().is_locked(path).unwrap());
    }
}
