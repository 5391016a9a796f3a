//! Stored fields.
//!
//! The `.docs` file keeps the stored values of every document as a bincode
//! record, preceded by an offset table for random access by doc id:
//!
//! ```text
//! doc_count: u32 | doc_count x record_offset: u64 | records (varint length | bincode)
//! ```

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::segment::{DocId, FORMAT_VERSION, write_framed};
use crate::storage::structured::{ByteReader, HEADER_LEN, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of stored fields files ("GDOC").
pub const STORED_MAGIC: u32 = 0x4744_4F43;

/// The stored values of one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFields {
    fields: Vec<(String, FieldValue)>,
}

impl StoredFields {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push<S: Into<String>>(&mut self, name: S, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// First value of a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// All values of a field.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| GlaiveError::serialization(format!("Failed to encode stored fields: {e}")))
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let (fields, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| {
                GlaiveError::serialization(format!("Failed to decode stored fields: {e}"))
            })?;
        Ok(fields)
    }
}

/// Buffers encoded records and writes the `.docs` file.
#[derive(Debug, Default)]
pub struct StoredFieldsWriter {
    records: Vec<u8>,
    offsets: Vec<u64>,
}

impl StoredFieldsWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record of the next doc id.
    pub fn add(&mut self, fields: &StoredFields) -> Result<()> {
        let encoded = fields.encode()?;
        self.offsets.push(self.records.len() as u64);
        crate::util::varint::write_u64(&mut self.records, encoded.len() as u64)?;
        self.records.extend_from_slice(&encoded);
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether no record was added.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Write the file.
    pub fn write(&self, storage: &dyn Storage, file_name: &str) -> Result<u64> {
        write_framed(storage, file_name, STORED_MAGIC, |writer| {
            writer.write_u32(self.offsets.len() as u32)?;
            for offset in &self.offsets {
                writer.write_u64(*offset)?;
            }
            writer.write_raw(&self.records)
        })
    }
}

/// Read-only view of a `.docs` file.
#[derive(Debug, Clone)]
pub struct StoredFieldsReader {
    data: FileBytes,
    doc_count: u32,
    records_start: usize,
    records_end: usize,
}

impl StoredFieldsReader {
    /// Validate and open a stored fields file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, STORED_MAGIC, FORMAT_VERSION)?;
        let doc_count = ByteReader::new(body)
            .read_u32()
            .map_err(|_| GlaiveError::corrupt(file_name, "missing document count"))?;
        let table_len = 4 + doc_count as usize * 8;
        if table_len > body.len() {
            return Err(GlaiveError::corrupt(file_name, "offset table truncated"));
        }
        let records_start = HEADER_LEN + table_len;
        let records_end = HEADER_LEN + body.len();
        Ok(StoredFieldsReader {
            data,
            doc_count,
            records_start,
            records_end,
        })
    }

    /// Number of documents.
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Load the stored values of `doc_id`.
    pub fn get(&self, doc_id: DocId) -> Result<StoredFields> {
        if doc_id >= self.doc_count {
            return Err(GlaiveError::index(format!(
                "doc id {doc_id} out of range ({} documents)",
                self.doc_count
            )));
        }
        let records = &self.data[self.records_start..self.records_end];
        let table = &self.data[HEADER_LEN + 4..self.records_start];
        let offset = ByteReader::at(table, doc_id as usize * 8).read_u64()? as usize;

        let mut reader = ByteReader::at(records, offset);
        StoredFields::decode(reader.read_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_random_access() {
        let storage = MemoryStorage::new();
        let mut writer = StoredFieldsWriter::new();

        let mut first = StoredFields::new();
        first.push("id", FieldValue::from("1"));
        first.push("body", FieldValue::from("The quick fox"));
        first.push("tag", FieldValue::from("a"));
        first.push("tag", FieldValue::from("b"));
        writer.add(&first).unwrap();

        writer.add(&StoredFields::new()).unwrap();

        let mut third = StoredFields::new();
        third.push(
            "s",
            FieldValue::Date(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()),
        );
        third.push("n", FieldValue::Integer(-3));
        third.push("f", FieldValue::Float(2.5));
        writer.add(&third).unwrap();
        writer.write(&storage, "s.docs").unwrap();

        let reader =
            StoredFieldsReader::open("s.docs", storage.read_file("s.docs").unwrap()).unwrap();
        assert_eq!(reader.doc_count(), 3);
        assert_eq!(reader.get(2).unwrap(), third);
        assert!(reader.get(1).unwrap().is_empty());

        let loaded = reader.get(0).unwrap();
        assert_eq!(loaded.get("body").and_then(FieldValue::as_text), Some("The quick fox"));
        assert_eq!(loaded.get_all("tag").count(), 2);
        assert!(reader.get(3).is_err());
    }
}
