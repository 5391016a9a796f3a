//! Storage abstraction layer.
//!
//! Segment files, deletion generations, manifests and the write lock all live
//! in a flat namespace provided by a [`Storage`] backend. Two backends are
//! provided: [`FileStorage`] for a directory on disk and [`MemoryStorage`] for
//! tests and purely in-process indexes.

pub mod file;
pub mod memory;
pub mod structured;
pub mod traits;

pub use file::{FileStorage, FileStorageConfig};
pub use memory::MemoryStorage;
pub use structured::{ByteReader, StructWriter};
pub use traits::{FileBytes, Storage, StorageError, StorageOutput};
