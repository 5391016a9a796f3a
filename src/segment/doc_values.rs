//! Doc values: the first value of every indexed field, per document.
//!
//! Column-oriented counterpart of the stored fields, loaded whole when a
//! segment opens and used to sort hits by field value.

use std::collections::BTreeMap;

use ahash::AHashMap;

use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::segment::{DocId, FORMAT_VERSION, write_framed};
use crate::storage::structured::{ByteReader, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of doc values files ("GDVF").
pub const DOC_VALUES_MAGIC: u32 = 0x4744_5646;

type Column = Vec<Option<FieldValue>>;

/// Collects doc values while a segment is built or merged.
#[derive(Debug, Default, Clone)]
pub struct DocValuesWriter {
    fields: BTreeMap<String, Column>,
}

impl DocValuesWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` for `doc_id` unless the field already has one.
    pub fn add(&mut self, doc_id: DocId, field: &str, value: &FieldValue) {
        let column = self.fields.entry(field.to_string()).or_default();
        let index = doc_id as usize;
        if column.len() <= index {
            column.resize(index + 1, None);
        }
        if column[index].is_none() {
            column[index] = Some(value.clone());
        }
    }

    /// Write the file for `doc_count` documents.
    pub fn write(&self, storage: &dyn Storage, file_name: &str, doc_count: u32) -> Result<u64> {
        write_framed(storage, file_name, DOC_VALUES_MAGIC, |writer| {
            writer.write_u32(self.fields.len() as u32)?;
            for (name, column) in &self.fields {
                let mut column = column.clone();
                column.resize(doc_count as usize, None);
                let encoded = bincode::serde::encode_to_vec(&column, bincode::config::standard())
                    .map_err(|e| {
                        GlaiveError::serialization(format!("Failed to encode doc values: {e}"))
                    })?;
                writer.write_string(name)?;
                writer.write_bytes(&encoded)?;
            }
            Ok(())
        })
    }
}

/// Decoded `.dv` file.
#[derive(Debug, Clone, Default)]
pub struct DocValues {
    fields: AHashMap<String, Column>,
}

impl DocValues {
    /// Validate and decode a doc values file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, DOC_VALUES_MAGIC, FORMAT_VERSION)?;
        let corrupt = |_| GlaiveError::corrupt(file_name, "truncated doc values");

        let mut reader = ByteReader::new(body);
        let field_count = reader.read_u32().map_err(corrupt)?;
        let mut fields = AHashMap::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let name = reader.read_string().map_err(corrupt)?.to_string();
            let bytes = reader.read_bytes().map_err(corrupt)?;
            let (column, _): (Column, _) =
                bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(
                    |e| GlaiveError::corrupt(file_name, format!("undecodable doc values: {e}")),
                )?;
            fields.insert(name, column);
        }
        Ok(DocValues { fields })
    }

    /// Value of `field` for `doc_id`.
    pub fn get(&self, doc_id: DocId, field: &str) -> Option<&FieldValue> {
        self.fields
            .get(field)
            .and_then(|column| column.get(doc_id as usize))
            .and_then(Option::as_ref)
    }
}
