//! Deletion bitmaps.
//!
//! Sealed segment files never change; logical deletes are recorded in a
//! bitmap persisted as its own generation file `<segment>_<gen>.del`. A
//! writer clones the bitmap of the current generation, marks documents and
//! writes the clone as the next generation at commit, so snapshots holding
//! the previous bitmap are unaffected.

use bit_vec::BitVec;

use crate::error::{GlaiveError, Result};
use crate::segment::{DocId, FORMAT_VERSION, write_framed};
use crate::storage::structured::{ByteReader, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of deletion files ("GDEL").
pub const DELETIONS_MAGIC: u32 = 0x4744_454C;

/// A bitmap of deleted documents (bit set = deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionBitmap {
    bits: BitVec,
    deleted_count: u32,
}

impl DeletionBitmap {
    /// A bitmap with no deletions for a segment of `max_doc` documents.
    pub fn new(max_doc: u32) -> Self {
        DeletionBitmap {
            bits: BitVec::from_elem(max_doc as usize, false),
            deleted_count: 0,
        }
    }

    /// Mark a document as deleted; returns whether it was live before.
    pub fn delete(&mut self, doc_id: DocId) -> Result<bool> {
        let index = doc_id as usize;
        match self.bits.get(index) {
            None => Err(GlaiveError::index(format!(
                "doc id {doc_id} out of range ({} documents)",
                self.bits.len()
            ))),
            Some(true) => Ok(false),
            Some(false) => {
                self.bits.set(index, true);
                self.deleted_count += 1;
                Ok(true)
            }
        }
    }

    /// Check if a document is deleted.
    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        self.bits.get(doc_id as usize).unwrap_or(false)
    }

    /// Number of deleted documents.
    pub fn deleted_count(&self) -> u32 {
        self.deleted_count
    }

    /// Number of documents covered by the bitmap.
    pub fn max_doc(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Number of live documents.
    pub fn live_count(&self) -> u32 {
        self.max_doc() - self.deleted_count
    }

    /// Deleted doc ids in ascending order.
    pub fn deleted_docs(&self) -> impl Iterator<Item = DocId> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, deleted)| *deleted)
            .map(|(doc, _)| doc as DocId)
    }

    /// Persist the bitmap.
    pub fn write(&self, storage: &dyn Storage, file_name: &str) -> Result<u64> {
        write_framed(storage, file_name, DELETIONS_MAGIC, |writer| {
            writer.write_u32(self.max_doc())?;
            writer.write_u32(self.deleted_count)?;
            writer.write_bytes(&self.bits.to_bytes())
        })
    }

    /// Load a persisted bitmap and check it covers `max_doc` documents.
    pub fn open(file_name: &str, data: FileBytes, max_doc: u32) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, DELETIONS_MAGIC, FORMAT_VERSION)?;
        let corrupt = |reason: &str| GlaiveError::corrupt(file_name, reason);

        let mut reader = ByteReader::new(body);
        let stored_max = reader.read_u32().map_err(|_| corrupt("truncated header"))?;
        let deleted_count = reader.read_u32().map_err(|_| corrupt("truncated header"))?;
        let bytes = reader.read_bytes().map_err(|_| corrupt("truncated bitmap"))?;
        if stored_max != max_doc {
            return Err(corrupt("bitmap size does not match segment"));
        }

        let mut bits = BitVec::from_bytes(bytes);
        if bits.len() < max_doc as usize {
            return Err(corrupt("bitmap shorter than segment"));
        }
        bits.truncate(max_doc as usize);
        let counted = bits.iter().filter(|deleted| *deleted).count() as u32;
        if counted != deleted_count {
            return Err(corrupt("deleted count does not match bitmap"));
        }
        Ok(DeletionBitmap {
            bits,
            deleted_count,
        })
    }
}
