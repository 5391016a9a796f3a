//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{GlaiveError, Result};
use crate::storage::traits::{FileBytes, Storage, StorageError, StorageOutput};

/// Configuration for [`FileStorage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Whether to memory-map files when reading them.
    pub use_mmap: bool,

    /// Buffer size for writes.
    pub buffer_size: usize,

    /// Whether to fsync every file when it is closed.
    pub sync_writes: bool,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        FileStorageConfig {
            use_mmap: false,
            buffer_size: 65536,
            sync_writes: true,
        }
    }
}

/// A directory on the local file system.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
    /// Storage configuration.
    config: FileStorageConfig,
}

impl FileStorage {
    /// Open (creating if needed) a file storage in the given directory.
    pub fn new<P: AsRef<Path>>(directory: P, config: FileStorageConfig) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();

        if !directory.exists() {
            std::fs::create_dir_all(&directory)?;
        }

        if !directory.is_dir() {
            return Err(GlaiveError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        Ok(FileStorage { directory, config })
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }

    /// Get the storage configuration.
    pub fn config(&self) -> &FileStorageConfig {
        &self.config
    }
}

fn map_open_error(name: &str, err: std::io::Error) -> GlaiveError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string()).into()
    } else {
        GlaiveError::Io(err)
    }
}

impl Storage for FileStorage {
    fn location(&self) -> &Path {
        &self.directory
    }

    fn read_file(&self, name: &str) -> Result<FileBytes> {
        let path = self.file_path(name);
        let mut file = File::open(&path).map_err(|e| map_open_error(name, e))?;

        let len = file.metadata()?.len();
        if self.config.use_mmap && len > 0 {
            // SAFETY: index files are written once and never modified in place.
            let mmap = unsafe { Mmap::map(&file)? };
            return Ok(FileBytes::new(mmap));
        }

        let mut data = Vec::with_capacity(len as usize);
        file.read_to_end(&mut data)?;
        Ok(FileBytes::new(data))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let path = self.file_path(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Box::new(FileOutput {
            writer: BufWriter::with_capacity(self.config.buffer_size, file),
            position: 0,
            sync_writes: self.config.sync_writes,
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).exists()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.file_path(name)).map_err(|e| map_open_error(name, e))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        let metadata =
            std::fs::metadata(self.file_path(name)).map_err(|e| map_open_error(name, e))?;
        Ok(metadata.len())
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name))
            .map_err(|e| map_open_error(old_name, e))
    }

    fn sync(&self) -> Result<()> {
        // Directory handles cannot be synced on every platform.
        #[cfg(unix)]
        {
            File::open(&self.directory)?.sync_all()?;
        }
        Ok(())
    }
}

/// Buffered output to a file.
#[derive(Debug)]
struct FileOutput {
    writer: BufWriter<File>,
    position: u64,
    sync_writes: bool,
    closed: bool,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.sync_writes {
            self.flush_and_sync()?;
        } else {
            self.writer.flush()?;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(use_mmap: bool) -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileStorageConfig {
            use_mmap,
            ..Default::default()
        };
        let storage = FileStorage::new(temp_dir.path(), config).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, storage) = storage(false);

        let mut output = storage.create_output("test.bin").unwrap();
        output.write_all(b"Hello, World!").unwrap();
        assert_eq!(output.position(), 13);
        output.close().unwrap();

        assert!(storage.file_exists("test.bin"));
        assert_eq!(storage.file_size("test.bin").unwrap(), 13);
        assert_eq!(&*storage.read_file("test.bin").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_mmap_read() {
        let (_dir, storage) = storage(true);

        let mut output = storage.create_output("mapped.bin").unwrap();
        output.write_all(&[7u8; 1024]).unwrap();
        output.close().unwrap();

        let bytes = storage.read_file("mapped.bin").unwrap();
        assert_eq!(bytes.len(), 1024);
        assert!(bytes.iter().all(|&b| b == 7));
    }

    #[test]
    fn test_rename_replaces_target() {
        let (_dir, storage) = storage(false);

        for (name, content) in [("a.tmp", b"new".as_slice()), ("a", b"old".as_slice())] {
            let mut output = storage.create_output(name).unwrap();
            output.write_all(content).unwrap();
            output.close().unwrap();
        }

        storage.rename_file("a.tmp", "a").unwrap();
        storage.sync().unwrap();

        assert!(!storage.file_exists("a.tmp"));
        assert_eq!(&*storage.read_file("a").unwrap(), b"new");
    }

    #[test]
    fn test_missing_file_is_reported() {
        let (_dir, storage) = storage(false);
        let err = storage.read_file("missing").unwrap_err();
        assert!(matches!(err, GlaiveError::Storage(_)));
    }

    #[test]
    fn test_list_and_delete() {
        let (_dir, storage) = storage(false);
        for name in ["b", "a", "c"] {
            storage.create_output(name).unwrap().close().unwrap();
        }
        assert_eq!(storage.list_files().unwrap(), vec!["a", "b", "c"]);

        storage.delete_file("b").unwrap();
        assert_eq!(storage.list_files().unwrap(), vec!["a", "c"]);
    }
}
