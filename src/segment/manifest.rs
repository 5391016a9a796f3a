//! Commit manifests.
//!
//! The durable state of an index is the newest readable `segments_<gen>`
//! file: the ordered segment list (oldest first) with the deletions
//! generation of each segment. A manifest is written to a temporary file,
//! renamed into place and followed by a directory sync, so a crash leaves
//! either the previous or the new manifest, never a partial one.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{GlaiveError, Result};
use crate::segment::{FORMAT_VERSION, SEGMENT_EXTENSIONS, deletions_file, segment_file, write_framed};
use crate::storage::structured::{ByteReader, verify_file};
use crate::storage::traits::Storage;

/// Magic number of manifest files ("GMAN").
pub const MANIFEST_MAGIC: u32 = 0x474D_414E;

/// File name prefix of manifests.
pub const MANIFEST_PREFIX: &str = "segments_";

/// One segment as recorded in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    /// Segment name.
    pub name: String,
    /// Number of documents, deleted ones included.
    pub max_doc: u32,
    /// Deletions generation; 0 means no deletions file.
    pub del_gen: u64,
    /// Number of deleted documents in that generation.
    pub deleted_count: u32,
}

impl SegmentEntry {
    /// Entry for a segment without deletions.
    pub fn new<S: Into<String>>(name: S, max_doc: u32) -> Self {
        SegmentEntry {
            name: name.into(),
            max_doc,
            del_gen: 0,
            deleted_count: 0,
        }
    }

    /// Live documents.
    pub fn num_docs(&self) -> u32 {
        self.max_doc - self.deleted_count
    }

    /// Files that belong to this entry.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = SEGMENT_EXTENSIONS
            .iter()
            .map(|extension| segment_file(&self.name, extension))
            .collect();
        if self.del_gen > 0 {
            files.push(deletions_file(&self.name, self.del_gen));
        }
        files
    }
}

/// A committed segment list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Commit generation; increases with every commit.
    pub generation: u64,
    /// Segments, oldest first.
    pub segments: Vec<SegmentEntry>,
    /// Number for the next segment name.
    pub next_segment: u64,
    /// Time of the commit.
    pub committed_at: DateTime<Utc>,
    /// Free-form commit data.
    #[serde(default)]
    pub user_data: BTreeMap<String, String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            generation: 0,
            segments: Vec::new(),
            next_segment: 1,
            committed_at: Utc::now(),
            user_data: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Manifest of an empty, never committed index.
    pub fn empty() -> Self {
        Self::default()
    }

    /// File name of generation `generation`.
    pub fn file_name(generation: u64) -> String {
        format!("{MANIFEST_PREFIX}{generation}")
    }

    /// Parse a manifest file name.
    pub fn parse_generation(file_name: &str) -> Option<u64> {
        file_name.strip_prefix(MANIFEST_PREFIX)?.parse().ok()
    }

    /// Total documents, deleted ones included.
    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|s| s.max_doc as u64).sum()
    }

    /// Total live documents.
    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| s.num_docs() as u64).sum()
    }

    /// Entry of a segment.
    pub fn entry(&self, name: &str) -> Option<&SegmentEntry> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Every file this manifest keeps alive, itself included.
    pub fn referenced_files(&self) -> BTreeSet<String> {
        let mut files: BTreeSet<String> = self.segments.iter().flat_map(SegmentEntry::files).collect();
        if self.generation > 0 {
            files.insert(Self::file_name(self.generation));
        }
        files
    }

    /// Durably publish this manifest under its generation.
    pub fn write(&self, storage: &dyn Storage) -> Result<String> {
        let name = Self::file_name(self.generation);
        let temp = format!("{name}.tmp");
        let json = serde_json::to_vec_pretty(self)?;

        let written = write_framed(storage, &temp, MANIFEST_MAGIC, |writer| {
            writer.write_bytes(&json)
        })
        .and_then(|_| storage.rename_file(&temp, &name));
        if let Err(e) = written {
            if storage.file_exists(&temp) {
                let _ = storage.delete_file(&temp);
            }
            return Err(e);
        }
        storage.sync()?;
        debug!(
            "wrote {name} with {} segments ({} docs)",
            self.segments.len(),
            self.num_docs()
        );
        Ok(name)
    }

    /// Read the manifest of `generation`.
    pub fn read(storage: &dyn Storage, generation: u64) -> Result<Self> {
        let name = Self::file_name(generation);
        let data = storage.read_file(&name)?;
        let (_, body) = verify_file(&name, &data, MANIFEST_MAGIC, FORMAT_VERSION)?;
        let json = ByteReader::new(body)
            .read_bytes()
            .map_err(|_| GlaiveError::corrupt(&name, "truncated manifest"))?;
        let manifest: Manifest = serde_json::from_slice(json)
            .map_err(|e| GlaiveError::corrupt(&name, format!("unreadable manifest: {e}")))?;
        if manifest.generation != generation {
            return Err(GlaiveError::corrupt(
                &name,
                format!("manifest records generation {}", manifest.generation),
            ));
        }
        Ok(manifest)
    }

    /// Generations of all manifests in storage, ascending.
    pub fn generations(storage: &dyn Storage) -> Result<Vec<u64>> {
        let mut generations: Vec<u64> = storage
            .list_files()?
            .iter()
            .filter_map(|name| Self::parse_generation(name))
            .collect();
        generations.sort_unstable();
        Ok(generations)
    }

    /// Load the newest readable manifest, `None` for a fresh index.
    ///
    /// A corrupt newest manifest falls back to an older one; if none is
    /// readable the error of the newest is returned.
    pub fn load_latest(storage: &dyn Storage) -> Result<Option<Self>> {
        let generations = Self::generations(storage)?;
        let mut first_error = None;
        for &generation in generations.iter().rev() {
            match Self::read(storage, generation) {
                Ok(manifest) => {
                    if first_error.is_some() {
                        warn!("falling back to manifest generation {generation}");
                    }
                    return Ok(Some(manifest));
                }
                Err(e) => {
                    warn!("cannot read {}: {e}", Self::file_name(generation));
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::StorageOutput;

    fn manifest(generation: u64) -> Manifest {
        let mut entry = SegmentEntry::new("segment_000001", 10);
        entry.del_gen = 2;
        entry.deleted_count = 3;
        Manifest {
            generation,
            segments: vec![entry, SegmentEntry::new("segment_000002", 5)],
            next_segment: 3,
            ..Manifest::default()
        }
    }

    #[test]
    fn test_write_and_load() {
        let storage = MemoryStorage::new();
        assert_eq!(Manifest::load_latest(&storage).unwrap(), None);

        manifest(1).write(&storage).unwrap();
        let second = manifest(2);
        assert_eq!(second.write(&storage).unwrap(), "segments_2");
        assert!(!storage.file_exists("segments_2.tmp"));

        let loaded = Manifest::load_latest(&storage).unwrap().unwrap();
        assert_eq!(loaded, second);
        assert_eq!(loaded.num_docs(), 12);
        assert_eq!(loaded.max_doc(), 15);
    }

    #[test]
    fn test_referenced_files() {
        let files = manifest(4).referenced_files();
        assert!(files.contains("segments_4"));
        assert!(files.contains("segment_000001_2.del"));
        assert!(files.contains("segment_000002.post"));
        assert!(!files.iter().any(|f| f.starts_with("segment_000002_")));
        assert_eq!(files.len(), 14);
    }

    #[test]
    fn test_corrupt_latest_falls_back() {
        let storage = MemoryStorage::new();
        manifest(1).write(&storage).unwrap();

        let mut output = storage.create_output("segments_2").unwrap();
        std::io::Write::write_all(&mut output, b"garbage that is long enough").unwrap();
        output.close().unwrap();

        let loaded = Manifest::load_latest(&storage).unwrap().unwrap();
        assert_eq!(loaded.generation, 1);
    }

    #[test]
    fn test_only_corrupt_manifest_is_an_error() {
        let storage = MemoryStorage::new();
        let mut output = storage.create_output("segments_1").unwrap();
        std::io::Write::write_all(&mut output, b"garbage that is long enough").unwrap();
        output.close().unwrap();

        let err = Manifest::load_latest(&storage).unwrap_err();
        assert!(err.is_corrupt_segment());
    }
}
