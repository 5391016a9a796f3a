//! Storage abstraction trait and common types.

use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::error::{GlaiveError, Result};

/// A trait for storage backends that hold index files.
///
/// Files are written once through [`StorageOutput`] and afterwards only read,
/// renamed or deleted. Readers get the whole file as [`FileBytes`], which
/// stays valid even if the file is deleted from the backend afterwards.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Location identifying this storage, used as the key of write locks.
    fn location(&self) -> &Path;

    /// Read a whole file for random access.
    fn read_file(&self, name: &str) -> Result<FileBytes>;

    /// Create (or truncate) a file for writing.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Rename a file, atomically replacing the target if it exists.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make previously completed renames and file creations durable.
    fn sync(&self) -> Result<()>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the current position in the output stream.
    fn position(&self) -> u64;

    /// Close the output stream, publishing its content under its name.
    fn close(&mut self) -> Result<()>;
}

impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> u64 {
        self.as_ref().position()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Immutable, cheaply clonable bytes of a stored file.
///
/// Backed either by an owned buffer or by a memory map.
#[derive(Clone)]
pub struct FileBytes {
    inner: Arc<dyn AsRef<[u8]> + Send + Sync>,
}

impl FileBytes {
    /// Wrap any byte container.
    pub fn new<T>(data: T) -> Self
    where
        T: AsRef<[u8]> + Send + Sync + 'static,
    {
        FileBytes {
            inner: Arc::new(data),
        }
    }

    /// Wrap an already shared buffer without copying it.
    pub fn from_shared(data: Arc<Vec<u8>>) -> Self {
        FileBytes { inner: data }
    }

    /// Borrow the bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.inner.as_ref().as_ref()
    }
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for FileBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBytes")
            .field("len", &self.as_slice().len())
            .finish()
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// File not found.
    FileNotFound(String),

    /// I/O error.
    IoError(String),

    /// Invalid operation.
    InvalidOperation(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for GlaiveError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::IoError(msg) => {
                GlaiveError::Io(std::io::Error::other(msg))
            }
            other => GlaiveError::storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("segments_1".to_string());
        assert_eq!(err.to_string(), "File not found: segments_1");

        let err = StorageError::InvalidOperation("output already closed".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid operation: output already closed"
        );
    }

    #[test]
    fn test_io_storage_error_maps_to_io_variant() {
        let err: GlaiveError = StorageError::IoError("disk full".to_string()).into();
        assert!(matches!(err, GlaiveError::Io(_)));
    }

    #[test]
    fn test_file_bytes_clone_shares_data() {
        let bytes = FileBytes::new(vec![1u8, 2, 3]);
        let copy = bytes.clone();
        assert_eq!(&*copy, &[1, 2, 3]);
        assert_eq!(bytes.len(), 3);
    }
}
