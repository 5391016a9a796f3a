//! Writing sealed segments.
//!
//! [`write_segment`] drives a [`SegmentWriter`] and guarantees that either
//! all files of the segment exist afterwards or none does. The `.meta` file
//! is written last, so a segment is never visible half written.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::error::{GlaiveError, Result};
use crate::segment::dictionary::TermDictionaryBuilder;
use crate::segment::doc_values::DocValuesWriter;
use crate::segment::field_lengths::FieldLengthsWriter;
use crate::segment::meta::{FieldInfo, SegmentInfo, SegmentSource};
use crate::segment::postings::{Posting, PostingsWriter};
use crate::segment::stored::{StoredFields, StoredFieldsWriter};
use crate::segment::{
    DICT_EXTENSION, DOC_VALUES_EXTENSION, LENGTHS_EXTENSION, META_EXTENSION, POSTINGS_EXTENSION,
    SEGMENT_EXTENSIONS, STORED_EXTENSION, segment_file,
};
use crate::storage::traits::Storage;

/// Accumulates the content of one segment while it is written.
pub struct SegmentWriter<'a> {
    storage: &'a dyn Storage,
    name: String,
    dictionary: TermDictionaryBuilder,
    postings: PostingsWriter,
    stored: StoredFieldsWriter,
    /// Field lengths of the new segment.
    pub lengths: FieldLengthsWriter,
    /// Doc values of the new segment.
    pub doc_values: DocValuesWriter,
    fields: BTreeMap<String, FieldInfo>,
}

impl<'a> SegmentWriter<'a> {
    fn create(storage: &'a dyn Storage, name: &str) -> Result<Self> {
        let postings = PostingsWriter::create(storage, &segment_file(name, POSTINGS_EXTENSION))?;
        Ok(SegmentWriter {
            storage,
            name: name.to_string(),
            dictionary: TermDictionaryBuilder::new(),
            postings,
            stored: StoredFieldsWriter::new(),
            lengths: FieldLengthsWriter::new(),
            doc_values: DocValuesWriter::new(),
            fields: BTreeMap::new(),
        })
    }

    /// Name of the segment being written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a term and its postings. Terms must arrive in key order;
    /// terms without postings are skipped.
    pub fn add_term(&mut self, encoded_key: &[u8], postings: &[Posting]) -> Result<()> {
        if postings.is_empty() {
            return Ok(());
        }
        let info = self.postings.write_term(postings)?;
        self.dictionary.insert(encoded_key, info)
    }

    /// Append the stored fields of the next document.
    pub fn add_stored(&mut self, fields: &StoredFields) -> Result<()> {
        self.stored.add(fields)
    }

    /// Record (or combine) the info of a field.
    pub fn add_field_info(&mut self, field: &str, info: &FieldInfo) -> Result<()> {
        match self.fields.get_mut(field) {
            Some(existing) => existing.merge(field, info)?,
            None => {
                self.fields.insert(field.to_string(), info.clone());
            }
        }
        Ok(())
    }

    /// Number of terms written so far.
    pub fn term_count(&self) -> usize {
        self.dictionary.len()
    }

    fn finish(self, max_doc: u32, source: SegmentSource) -> Result<SegmentInfo> {
        let name = self.name;
        self.postings.finish()?;
        self.dictionary
            .write(self.storage, &segment_file(&name, DICT_EXTENSION))?;
        self.stored
            .write(self.storage, &segment_file(&name, STORED_EXTENSION))?;
        self.lengths
            .write(self.storage, &segment_file(&name, LENGTHS_EXTENSION), max_doc)?;
        self.doc_values
            .write(self.storage, &segment_file(&name, DOC_VALUES_EXTENSION), max_doc)?;

        let info = SegmentInfo::new(&name, max_doc, self.fields, source);
        info.write(self.storage, &segment_file(&name, META_EXTENSION))?;
        Ok(info)
    }
}

/// Write a segment named `name`.
///
/// `fill` adds terms, stored fields, lengths and doc values and returns the
/// number of documents. If anything fails, every file of the segment that
/// was already created is removed again and the error is returned.
pub fn write_segment<F>(
    storage: &dyn Storage,
    name: &str,
    source: SegmentSource,
    fill: F,
) -> Result<SegmentInfo>
where
    F: FnOnce(&mut SegmentWriter<'_>) -> Result<u32>,
{
    let result = SegmentWriter::create(storage, name).and_then(|mut writer| {
        let max_doc = fill(&mut writer)?;
        if writer.stored.len() != max_doc as usize {
            return Err(GlaiveError::index(format!(
                "segment {name} has {} stored records for {max_doc} documents",
                writer.stored.len()
            )));
        }
        let term_count = writer.term_count();
        let info = writer.finish(max_doc, source)?;
        debug!("wrote segment {name}: {max_doc} docs, {term_count} terms");
        Ok(info)
    });

    if result.is_err() {
        remove_segment_files(storage, name);
    }
    result
}

/// Best-effort removal of the sealed files of a segment.
pub fn remove_segment_files(storage: &dyn Storage, name: &str) {
    for extension in SEGMENT_EXTENSIONS {
        let file = segment_file(name, extension);
        if storage.file_exists(&file)
            && let Err(e) = storage.delete_file(&file)
        {
            warn!("failed to remove {file}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::field_value::{FieldValue, ValueType};
    use crate::segment::term::TermKey;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_write_segment_creates_all_files() {
        let storage = MemoryStorage::new();
        let info = write_segment(&storage, "segment_000001", SegmentSource::Flush, |writer| {
            writer.add_term(
                &TermKey::main("body", "fox").encode(),
                &[Posting::new(0, vec![1])],
            )?;
            let mut stored = StoredFields::new();
            stored.push("body", FieldValue::from("the fox"));
            writer.add_stored(&stored)?;
            writer.lengths.add(0, "body", 1);
            writer.add_field_info(
                "body",
                &FieldInfo {
                    value_type: ValueType::Text,
                    indexed: true,
                    has_surface: false,
                    verbatim: false,
                },
            )?;
            Ok(1)
        })
        .unwrap();

        assert_eq!(info.max_doc, 1);
        for extension in SEGMENT_EXTENSIONS {
            assert!(storage.file_exists(&segment_file("segment_000001", extension)));
        }
    }

    #[test]
    fn test_failure_removes_partial_files() {
        let storage = MemoryStorage::new();
        let result = write_segment(&storage, "segment_000002", SegmentSource::Flush, |writer| {
            writer.add_term(&TermKey::main("a", "b").encode(), &[Posting::new(0, vec![0])])?;
            Err(GlaiveError::other("boom"))
        });

        assert!(result.is_err());
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_record_count_must_match() {
        let storage = MemoryStorage::new();
        let result = write_segment(&storage, "segment_000003", SegmentSource::Flush, |_| Ok(2));
        assert!(result.is_err());
        assert_eq!(storage.file_count(), 0);
    }
}
