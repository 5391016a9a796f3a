//! Segment metadata (`.meta`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::field_value::ValueType;
use crate::error::{GlaiveError, Result};
use crate::segment::{FORMAT_VERSION, write_framed};
use crate::storage::structured::{ByteReader, verify_file};
use crate::storage::traits::{FileBytes, Storage};

/// Magic number of metadata files ("GMET").
pub const META_MAGIC: u32 = 0x474D_4554;

/// What is known about one field of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Type of the values indexed in the field.
    pub value_type: ValueType,
    /// Whether the field has postings.
    pub indexed: bool,
    /// Whether the field's analyzer emitted surface channel terms.
    pub has_surface: bool,
    /// Whether some values went to the main channel verbatim, with no
    /// surface twin (keywords, numbers, dates).
    #[serde(default)]
    pub verbatim: bool,
}

impl FieldInfo {
    /// Combine the info of the same field from two segments.
    ///
    /// Fields whose values have different types cannot be combined: their
    /// range keys would be read with the wrong type.
    pub fn merge(&mut self, field: &str, other: &FieldInfo) -> Result<()> {
        if self.value_type != other.value_type {
            return Err(GlaiveError::index(format!(
                "field {field} holds {} values and {} values",
                self.value_type, other.value_type
            )));
        }
        self.indexed |= other.indexed;
        self.has_surface |= other.has_surface;
        self.verbatim |= other.verbatim;
        Ok(())
    }
}

/// How a segment came to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SegmentSource {
    /// Flushed from the writer's buffer.
    Flush,
    /// Produced by merging the named segments.
    Merge {
        /// Input segments.
        inputs: Vec<String>,
    },
}

/// Metadata of a sealed segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    /// Segment name, also the stem of its file names.
    pub name: String,
    /// Number of documents, deleted ones included.
    pub max_doc: u32,
    /// Format version the segment was written with.
    pub format_version: u32,
    /// Field infos by field name.
    pub fields: BTreeMap<String, FieldInfo>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Origin of the segment.
    pub source: SegmentSource,
}

impl SegmentInfo {
    /// Create metadata for a new segment.
    pub fn new<S: Into<String>>(
        name: S,
        max_doc: u32,
        fields: BTreeMap<String, FieldInfo>,
        source: SegmentSource,
    ) -> Self {
        SegmentInfo {
            name: name.into(),
            max_doc,
            format_version: FORMAT_VERSION,
            fields,
            created_at: Utc::now(),
            source,
        }
    }

    /// Info of one field.
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    /// Write the `.meta` file.
    pub fn write(&self, storage: &dyn Storage, file_name: &str) -> Result<u64> {
        let json = serde_json::to_vec_pretty(self)?;
        write_framed(storage, file_name, META_MAGIC, |writer| writer.write_bytes(&json))
    }

    /// Validate and decode a `.meta` file.
    pub fn open(file_name: &str, data: FileBytes) -> Result<Self> {
        let (_, body) = verify_file(file_name, &data, META_MAGIC, FORMAT_VERSION)?;
        let json = ByteReader::new(body)
            .read_bytes()
            .map_err(|_| GlaiveError::corrupt(file_name, "truncated metadata"))?;
        serde_json::from_slice(json)
            .map_err(|e| GlaiveError::corrupt(file_name, format!("unreadable metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_write_and_open() {
        let storage = MemoryStorage::new();
        let mut fields = BTreeMap::new();
        fields.insert(
            "body".to_string(),
            FieldInfo {
                value_type: ValueType::Text,
                indexed: true,
                has_surface: true,
                verbatim: false,
            },
        );
        let info = SegmentInfo::new(
            "segment_000003",
            12,
            fields,
            SegmentSource::Merge {
                inputs: vec!["segment_000001".into(), "segment_000002".into()],
            },
        );
        info.write(&storage, "segment_000003.meta").unwrap();

        let loaded =
            SegmentInfo::open("segment_000003.meta", storage.read_file("segment_000003.meta").unwrap())
                .unwrap();
        assert_eq!(loaded, info);
        assert!(loaded.field("body").unwrap().has_surface);
    }

    #[test]
    fn test_field_info_merge() {
        let mut info = FieldInfo {
            value_type: ValueType::Text,
            indexed: false,
            has_surface: true,
            verbatim: false,
        };
        let keyword = FieldInfo {
            value_type: ValueType::Text,
            indexed: true,
            has_surface: false,
            verbatim: true,
        };
        info.merge("tag", &keyword).unwrap();
        assert!(info.indexed && info.has_surface && info.verbatim);

        let date = FieldInfo {
            value_type: ValueType::Date,
            ..keyword
        };
        let err = info.merge("tag", &date).unwrap_err();
        assert!(err.to_string().contains("tag"), "{err}");
        assert_eq!(info.value_type, ValueType::Text);
    }

    #[test]
    fn test_old_metadata_without_verbatim_flag() {
        let info: FieldInfo =
            serde_json::from_str(r#"{"value_type":"integer","indexed":true,"has_surface":false}"#)
                .unwrap();
        assert!(!info.verbatim);
    }
}
