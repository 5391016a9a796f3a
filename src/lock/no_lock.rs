//! Lock factory that never locks.

use std::path::Path;

use crate::error::Result;
use crate::lock::{HeldLock, LockFactory, LockHandle};

/// Always grants the write lock.
///
/// For embeddings where the caller already guarantees that only one writer
/// exists for an index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLockFactory;

impl LockFactory for NoLockFactory {
    fn name(&self) -> &'static str {
        "none"
    }

    fn acquire_write_lock(&self, index_path: &Path) -> Result<LockHandle> {
        Ok(LockHandle::new(index_path.to_path_buf(), Box::new(NoLock)))
    }

    fn is_locked(&self, _index_path: &Path) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Debug)]
struct NoLock;

impl HeldLock for NoLock {
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_contends() {
        let factory = NoLockFactory;
        let path = Path::new("/nonexistent/index");

        let first = factory.acquire_write_lock(path).unwrap();
        let second = factory.acquire_write_lock(path).unwrap();

        assert!(first.is_valid() && second.is_valid());
        assert!(!factory.is_locked(path).unwrap());
    }
}
