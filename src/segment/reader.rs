//! Read access to a sealed segment.

use std::sync::Arc;

use log::debug;

use crate::document::field_value::FieldValue;
use crate::error::{GlaiveError, Result};
use crate::segment::deletions::DeletionBitmap;
use crate::segment::dictionary::{TermDictionary, TermInfo};
use crate::segment::doc_values::DocValues;
use crate::segment::field_lengths::FieldLengths;
use crate::segment::meta::{FieldInfo, SegmentInfo};
use crate::segment::postings::{Posting, PostingsFile, PostingsIterator};
use crate::segment::stored::{StoredFields, StoredFieldsReader};
use crate::segment::term::TermKey;
use crate::segment::{
    DICT_EXTENSION, DOC_VALUES_EXTENSION, DocId, LENGTHS_EXTENSION, META_EXTENSION,
    POSTINGS_EXTENSION, SEGMENT_EXTENSIONS, STORED_EXTENSION, deletions_file, segment_file,
};
use crate::storage::traits::Storage;

/// The immutable part of an open segment, shared by every snapshot that
/// contains the segment.
#[derive(Debug)]
struct SegmentCore {
    info: SegmentInfo,
    dictionary: TermDictionary,
    postings: PostingsFile,
    stored: StoredFieldsReader,
    lengths: FieldLengths,
    doc_values: DocValues,
}

/// An open segment together with one generation of its deletions.
///
/// Cloning is cheap; the loaded files are shared and stay valid after the
/// segment files are removed from storage.
#[derive(Debug, Clone)]
pub struct SegmentReader {
    core: Arc<SegmentCore>,
    deletions: Option<Arc<DeletionBitmap>>,
    del_gen: u64,
}

impl SegmentReader {
    /// Open segment `name`, with the deletions of generation `del_gen` when
    /// given.
    ///
    /// Every file is validated; any mismatch is reported as a corrupt
    /// segment.
    pub fn open(storage: &dyn Storage, name: &str, del_gen: Option<u64>) -> Result<Self> {
        let read = |extension: &str| {
            let file = segment_file(name, extension);
            storage.read_file(&file).map(|data| (file, data))
        };

        let (file, data) = read(META_EXTENSION)?;
        let info = SegmentInfo::open(&file, data)?;
        if info.name != name {
            return Err(GlaiveError::corrupt(
                name,
                format!("metadata names segment {}", info.name),
            ));
        }

        let (file, data) = read(DICT_EXTENSION)?;
        let dictionary = TermDictionary::open(&file, data)?;
        let (file, data) = read(POSTINGS_EXTENSION)?;
        let postings = PostingsFile::open(&file, data)?;
        let (file, data) = read(STORED_EXTENSION)?;
        let stored = StoredFieldsReader::open(&file, data)?;
        let (file, data) = read(LENGTHS_EXTENSION)?;
        let lengths = FieldLengths::open(&file, data)?;
        let (file, data) = read(DOC_VALUES_EXTENSION)?;
        let doc_values = DocValues::open(&file, data)?;

        if stored.doc_count() != info.max_doc {
            return Err(GlaiveError::corrupt(
                name,
                format!(
                    "{} stored records for {} documents",
                    stored.doc_count(),
                    info.max_doc
                ),
            ));
        }

        let core = Arc::new(SegmentCore {
            info,
            dictionary,
            postings,
            stored,
            lengths,
            doc_values,
        });
        debug!(
            "opened segment {name}: {} docs, {} terms",
            core.info.max_doc,
            core.dictionary.len()
        );

        let reader = SegmentReader {
            core,
            deletions: None,
            del_gen: 0,
        };
        match del_gen {
            Some(generation) if generation > 0 => {
                let file = deletions_file(name, generation);
                let data = storage.read_file(&file)?;
                let bitmap = DeletionBitmap::open(&file, data, reader.max_doc())?;
                Ok(reader.with_deletions(generation, Arc::new(bitmap)))
            }
            _ => Ok(reader),
        }
    }

    /// The same segment seen through another deletions generation.
    pub fn with_deletions(&self, del_gen: u64, deletions: Arc<DeletionBitmap>) -> Self {
        SegmentReader {
            core: Arc::clone(&self.core),
            deletions: Some(deletions),
            del_gen,
        }
    }

    /// Segment name.
    pub fn name(&self) -> &str {
        &self.core.info.name
    }

    /// Segment metadata.
    pub fn info(&self) -> &SegmentInfo {
        &self.core.info
    }

    /// Number of documents, deleted ones included.
    pub fn max_doc(&self) -> u32 {
        self.core.info.max_doc
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> u32 {
        self.max_doc() - self.deleted_count()
    }

    /// Number of deleted documents.
    pub fn deleted_count(&self) -> u32 {
        self.deletions
            .as_ref()
            .map_or(0, |deletions| deletions.deleted_count())
    }

    /// Current deletions generation (0 when there are none).
    pub fn del_gen(&self) -> u64 {
        self.del_gen
    }

    /// Deletions bitmap, if any document was ever deleted.
    pub fn deletions(&self) -> Option<&Arc<DeletionBitmap>> {
        self.deletions.as_ref()
    }

    /// Check if a document is deleted.
    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        self.deletions
            .as_ref()
            .is_some_and(|deletions| deletions.is_deleted(doc_id))
    }

    /// The term dictionary.
    pub fn dictionary(&self) -> &TermDictionary {
        &self.core.dictionary
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.core.dictionary.len()
    }

    /// Dictionary entry of a term.
    pub fn term_info(&self, term: &TermKey) -> Option<TermInfo> {
        self.core.dictionary.get(term)
    }

    /// Number of documents containing a term, deleted ones included.
    pub fn doc_freq(&self, term: &TermKey) -> u32 {
        self.term_info(term).map_or(0, |info| info.doc_freq)
    }

    /// Postings of a term, `None` when the segment lacks the term.
    ///
    /// The iterator does not filter deleted documents; matchers do.
    pub fn postings(&self, term: &TermKey) -> Result<Option<PostingsIterator>> {
        self.term_info(term)
            .map(|info| self.postings_for(info))
            .transpose()
    }

    /// Postings of a dictionary entry.
    pub fn postings_for(&self, info: TermInfo) -> Result<PostingsIterator> {
        self.core.postings.iterator(info)
    }

    /// Decode all postings of a dictionary entry.
    pub fn read_postings(&self, info: TermInfo) -> Result<Vec<Posting>> {
        self.core.postings.read_all(info)
    }

    /// Info of a field.
    pub fn field_info(&self, field: &str) -> Option<&FieldInfo> {
        self.core.info.field(field)
    }

    /// Number of main channel tokens of `field` in `doc_id`.
    pub fn field_length(&self, doc_id: DocId, field: &str) -> u32 {
        self.core.lengths.get(doc_id, field)
    }

    /// First value of `field` in `doc_id`.
    pub fn doc_value(&self, doc_id: DocId, field: &str) -> Option<&FieldValue> {
        self.core.doc_values.get(doc_id, field)
    }

    /// Load the stored fields of `doc_id`.
    pub fn stored_fields(&self, doc_id: DocId) -> Result<StoredFields> {
        self.core.stored.get(doc_id)
    }

    /// Names of the sealed files of this segment.
    pub fn file_names(&self) -> Vec<String> {
        SEGMENT_EXTENSIONS
            .iter()
            .map(|extension| segment_file(self.name(), extension))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::document::document::Document;
    use crate::segment::builder::SegmentBuilder;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::StorageOutput;

    fn flushed(storage: &MemoryStorage) -> SegmentInfo {
        let analyzer = PerFieldAnalyzer::new(Arc::new(StandardAnalyzer::new()));
        let mut builder = SegmentBuilder::new(Arc::new(analyzer));
        for body in ["alpha beta", "beta gamma", "gamma delta"] {
            builder
                .add_document(&Document::builder().add_text("body", body).build())
                .unwrap();
        }
        builder.flush(storage, "segment_000001").unwrap()
    }

    #[test]
    fn test_open_and_deletions() {
        let storage = MemoryStorage::new();
        flushed(&storage);

        let reader = SegmentReader::open(&storage, "segment_000001", None).unwrap();
        assert_eq!(reader.max_doc(), 3);
        assert_eq!(reader.num_docs(), 3);
        assert_eq!(reader.doc_freq(&TermKey::main("body", "beta")), 2);
        assert_eq!(
            reader.stored_fields(1).unwrap().get("body"),
            Some(&FieldValue::from("beta gamma"))
        );

        let mut bitmap = DeletionBitmap::new(3);
        bitmap.delete(1).unwrap();
        bitmap
            .write(&storage, &deletions_file("segment_000001", 1))
            .unwrap();

        let deleted = SegmentReader::open(&storage, "segment_000001", Some(1)).unwrap();
        assert!(deleted.is_deleted(1));
        assert_eq!(deleted.num_docs(), 2);
        // postings are still physically present
        assert_eq!(deleted.doc_freq(&TermKey::main("body", "beta")), 2);
        assert!(!reader.is_deleted(1));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let storage = MemoryStorage::new();
        flushed(&storage);

        let file = segment_file("segment_000001", POSTINGS_EXTENSION);
        let mut bytes = storage.read_file(&file).unwrap().to_vec();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x55;
        let mut output = storage.create_output(&file).unwrap();
        std::io::Write::write_all(&mut output, &bytes).unwrap();
        output.close().unwrap();

        let err = SegmentReader::open(&storage, "segment_000001", None).unwrap_err();
        assert!(err.is_corrupt_segment());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let storage = MemoryStorage::new();
        flushed(&storage);
        storage
            .delete_file(&segment_file("segment_000001", DOC_VALUES_EXTENSION))
            .unwrap();
        assert!(SegmentReader::open(&storage, "segment_000001", None).is_err());
    }
}
