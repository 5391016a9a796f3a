//! Per-field token counts used for length normalisation.
//!
//! ```text
//! doc_count: u32 | field_count: u32 | field_count x (name | doc_count x length: varint)
//! ```

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::error::{GlaiveError, Result};
use crate::segment::{DocId, FORMAT_VERSION, write_framed};
use crate::storage::structured::{ByteReader, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of field length files ("GLEN").
pub const LENGTHS_MAGIC: u32 = 0x474C_454E;

/// Collects field lengths while a segment is built or merged.
#[derive(Debug, Default, Clone)]
pub struct FieldLengthsWriter {
    fields: BTreeMap<String, Vec<u32>>,
}

impl FieldLengthsWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `length` tokens of `field` to `doc_id`.
    pub fn add(&mut self, doc_id: DocId, field: &str, length: u32) {
        let lengths = self.fields.entry(field.to_string()).or_default();
        let index = doc_id as usize;
        if lengths.len() <= index {
            lengths.resize(index + 1, 0);
        }
        lengths[index] += length;
    }

    /// Length of `field` in `doc_id` recorded so far.
    pub fn get(&self, doc_id: DocId, field: &str) -> u32 {
        self.fields
            .get(field)
            .and_then(|lengths| lengths.get(doc_id as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Write the file for `doc_count` documents.
    pub fn write(&self, storage: &dyn Storage, file_name: &str, doc_count: u32) -> Result<u64> {
        write_framed(storage, file_name, LENGTHS_MAGIC, |writer| {
            writer.write_u32(doc_count)?;
            writer.write_u32(self.fields.len() as u32)?;
            for (name, lengths) in &self.fields {
                writer.write_string(name)?;
                for doc in 0..doc_count as usize {
                    writer.write_varint(lengths.get(doc).copied().unwrap_or(0) as u64)?;
                }
            }
            Ok(())
        })
    }
}

/// Decoded `.lens` file.
#[derive(Debug, Clone, Default)]
pub struct FieldLengths {
    fields: AHashMap<String, Vec<u32>>,
}

impl FieldLengths {
    /// Validate and decode a field lengths file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, LENGTHS_MAGIC, FORMAT_VERSION)?;
        let corrupt = |_| GlaiveError::corrupt(file_name, "truncated field lengths");

        let mut reader = ByteReader::new(body);
        let doc_count = reader.read_u32().map_err(corrupt)? as usize;
        let field_count = reader.read_u32().map_err(corrupt)?;

        let mut fields = AHashMap::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let name = reader.read_string().map_err(corrupt)?.to_string();
            let mut lengths = Vec::with_capacity(doc_count);
            for _ in 0..doc_count {
                lengths.push(reader.read_varint().map_err(corrupt)? as u32);
            }
            fields.insert(name, lengths);
        }
        Ok(FieldLengths { fields })
    }

    /// Number of tokens of `field` in `doc_id`; zero when absent.
    pub fn get(&self, doc_id: DocId, field: &str) -> u32 {
        self.fields
            .get(field)
            .and_then(|lengths| lengths.get(doc_id as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Whether any document has a length recorded for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
