//! In-memory storage implementation for testing and embedding.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::traits::{FileBytes, Storage, StorageError, StorageOutput};

type FileMap = Arc<Mutex<HashMap<String, Arc<Vec<u8>>>>>;

/// An in-memory storage implementation.
///
/// Every instance gets a unique `memory://<uuid>` location so that
/// in-process locks keyed by location never collide.
#[derive(Debug)]
pub struct MemoryStorage {
    /// The files stored in memory.
    files: FileMap,
    /// Unique location of this storage.
    location: PathBuf,
}

impl MemoryStorage {
    /// Create a new, empty memory storage.
    pub fn new() -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(HashMap::new())),
            location: PathBuf::from(format!("memory://{}", Uuid::new_v4())),
        }
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.lock().values().map(|data| data.len() as u64).sum()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn location(&self) -> &Path {
        &self.location
    }

    fn read_file(&self, name: &str) -> Result<FileBytes> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        Ok(FileBytes::from_shared(Arc::clone(data)))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()).into())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;
        Ok(data.len() as u64)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Output that becomes visible in the storage when closed.
#[derive(Debug)]
struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
    closed: bool,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("output already closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let data = std::mem::take(&mut self.buffer);
        self.files.lock().insert(self.name.clone(), Arc::new(data));
        self.closed = true;
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        // Unclosed outputs publish what they have, matching a file left on disk.
        if !self.closed {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_visible_after_close() {
        let storage = MemoryStorage::new();

        let mut output = storage.create_output("test.bin").unwrap();
        output.write_all(b"Hello").unwrap();
        assert!(!storage.file_exists("test.bin"));

        output.close().unwrap();
        assert!(storage.file_exists("test.bin"));
        assert_eq!(&*storage.read_file("test.bin").unwrap(), b"Hello");
        assert_eq!(storage.file_size("test.bin").unwrap(), 5);
    }

    #[test]
    fn test_readers_keep_deleted_bytes() {
        let storage = MemoryStorage::new();
        let mut output = storage.create_output("seg.post").unwrap();
        output.write_all(&[1, 2, 3]).unwrap();
        output.close().unwrap();

        let bytes = storage.read_file("seg.post").unwrap();
        storage.delete_file("seg.post").unwrap();

        assert!(!storage.file_exists("seg.post"));
        assert_eq!(&*bytes, &[1, 2, 3]);
    }

    #[test]
    fn test_rename_and_list() {
        let storage = MemoryStorage::new();
        storage.create_output("b.tmp").unwrap().close().unwrap();
        storage.create_output("a").unwrap().close().unwrap();

        storage.rename_file("b.tmp", "b").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a", "b"]);
        assert_eq!(storage.file_count(), 2);
        assert!(storage.rename_file("missing", "x").is_err());
    }

    #[test]
    fn test_locations_are_unique() {
        let first = MemoryStorage::new();
        let second = MemoryStorage::new();
        assert_ne!(first.location(), second.location());
        assert!(first.location().to_string_lossy().starts_with("memory://"));
    }
}
