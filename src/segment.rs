//! Sealed, immutable index segments.
//!
//! A segment is written once and never modified afterwards. Its files share
//! the segment name as a stem:
//!
//! | file | content |
//! |------|---------|
//! | `<name>.meta` | [`SegmentInfo`] as JSON |
//! | `<name>.dict` | sorted term dictionary |
//! | `<name>.post` | postings with positions |
//! | `<name>.docs` | stored fields |
//! | `<name>.lens` | per-field token counts |
//! | `<name>.dv`   | doc values used for sorting |
//! | `<name>_<gen>.del` | deletions bitmap of generation `gen` |
//!
//! Every file is framed by a magic number, a format version and a trailing
//! CRC32 (see [`crate::storage::structured`]). Documents are addressed by a
//! segment-local [`DocId`]; across an index a document is a [`DocAddress`].

pub mod builder;
pub mod deletions;
pub mod dictionary;
pub mod doc_values;
pub mod field_lengths;
pub mod manifest;
pub mod merge;
pub mod meta;
pub mod postings;
pub mod reader;
pub mod stored;
pub mod term;
pub mod writer;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::structured::StructWriter;
use crate::storage::traits::{Storage, StorageOutput};

pub use builder::SegmentBuilder;
pub use deletions::DeletionBitmap;
pub use manifest::{Manifest, SegmentEntry};
pub use merge::{MergeOutput, merge_segments};
pub use meta::{FieldInfo, SegmentInfo};
pub use reader::SegmentReader;
pub use stored::StoredFields;
pub use term::TermKey;

/// Segment-local document id.
pub type DocId = u32;

/// Doc id reported by exhausted iterators.
pub const TERMINATED: DocId = DocId::MAX;

/// Current version written into every segment file.
pub const FORMAT_VERSION: u32 = 1;

/// Extension of the metadata file.
pub const META_EXTENSION: &str = "meta";
/// Extension of the term dictionary.
pub const DICT_EXTENSION: &str = "dict";
/// Extension of the postings file.
pub const POSTINGS_EXTENSION: &str = "post";
/// Extension of the stored fields file.
pub const STORED_EXTENSION: &str = "docs";
/// Extension of the field lengths file.
pub const LENGTHS_EXTENSION: &str = "lens";
/// Extension of the doc values file.
pub const DOC_VALUES_EXTENSION: &str = "dv";

/// Extensions of the sealed files of a segment.
pub const SEGMENT_EXTENSIONS: [&str; 6] = [
    META_EXTENSION,
    DICT_EXTENSION,
    POSTINGS_EXTENSION,
    STORED_EXTENSION,
    LENGTHS_EXTENSION,
    DOC_VALUES_EXTENSION,
];

static INDEX_FILE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(segment_\d+(\.(meta|dict|post|docs|lens|dv)|_\d+\.del)|segments_\d+(\.tmp)?)$").ok()
});

/// A document address across an index: the segment ordinal within a
/// snapshot and the local doc id within that segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocAddress {
    /// Position of the segment in the snapshot, oldest first.
    pub segment_ord: u32,
    /// Local document id.
    pub doc_id: DocId,
}

impl DocAddress {
    /// Create an address.
    pub fn new(segment_ord: u32, doc_id: DocId) -> Self {
        DocAddress {
            segment_ord,
            doc_id,
        }
    }
}

/// Name of the `n`-th segment of an index.
pub fn segment_name(number: u64) -> String {
    format!("segment_{number:06}")
}

/// Parse the number out of a segment name.
pub fn segment_number(name: &str) -> Option<u64> {
    name.strip_prefix("segment_")?.parse().ok()
}

/// File name of one sealed segment file.
pub fn segment_file(segment: &str, extension: &str) -> String {
    format!("{segment}.{extension}")
}

/// File name of a deletions generation.
pub fn deletions_file(segment: &str, generation: u64) -> String {
    format!("{segment}_{generation}.del")
}

/// Whether a file name belongs to the index (and may be garbage collected).
///
/// The write lock and any foreign files never match.
pub fn is_index_file(name: &str) -> bool {
    INDEX_FILE_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(name))
}

/// Write one framed file and close it.
pub(crate) fn write_framed<F>(
    storage: &dyn Storage,
    name: &str,
    magic: u32,
    body: F,
) -> Result<u64>
where
    F: FnOnce(&mut StructWriter<Box<dyn StorageOutput>>) -> Result<()>,
{
    let output = storage.create_output(name)?;
    let mut writer = StructWriter::with_header(output, magic, FORMAT_VERSION)?;
    body(&mut writer)?;
    let length = writer.position() + crate::storage::structured::TRAILER_LEN as u64;
    let mut output = writer.finish()?;
    output.close()?;
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(segment_name(7), "segment_000007");
        assert_eq!(segment_number("segment_000007"), Some(7));
        assert_eq!(segment_number("segments_3"), None);
        assert_eq!(segment_file("segment_000001", DICT_EXTENSION), "segment_000001.dict");
        assert_eq!(deletions_file("segment_000001", 4), "segment_000001_4.del");
    }

    #[test]
    fn test_index_file_pattern() {
        for name in [
            "segment_000001.meta",
            "segment_000001.post",
            "segment_000012_3.del",
            "segments_4",
            "segments_4.tmp",
        ] {
            assert!(is_index_file(name), "{name}");
        }
        for name in ["write.lock", "notes.txt", "segment_a.dict", "segments_x"] {
            assert!(!is_index_file(name), "{name}");
        }
    }

    #[test]
    fn test_doc_address_order() {
        let mut addresses = vec![
            DocAddress::new(1, 0),
            DocAddress::new(0, 5),
            DocAddress::new(0, 2),
        ];
        addresses.sort();
        assert_eq!(
            addresses,
            vec![
                DocAddress::new(0, 2),
                DocAddress::new(0, 5),
                DocAddress::new(1, 0)
            ]
        );
    }
}
