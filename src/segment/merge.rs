//! Merging sealed segments.
//!
//! A merge reads N segments through their deletions view and writes one new
//! segment holding only the live documents, renumbered contiguously in input
//! order. The inputs are never modified; if writing the output fails, the
//! partially written files are removed and the inputs remain the valid state.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use log::debug;

use crate::error::{GlaiveError, Result};
use crate::segment::meta::{SegmentInfo, SegmentSource};
use crate::segment::postings::Posting;
use crate::segment::reader::SegmentReader;
use crate::segment::writer::write_segment;
use crate::segment::DocId;
use crate::storage::traits::Storage;

/// Maps old doc ids of one input to doc ids of the merged segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocMap {
    new_ids: Vec<Option<DocId>>,
}

impl DocMap {
    fn build(reader: &SegmentReader, base: DocId) -> Self {
        let mut next = base;
        let new_ids = (0..reader.max_doc())
            .map(|doc| {
                if reader.is_deleted(doc) {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect();
        DocMap { new_ids }
    }

    /// New id of `old`, `None` when the document was dropped.
    pub fn get(&self, old: DocId) -> Option<DocId> {
        self.new_ids.get(old as usize).copied().flatten()
    }

    /// Number of documents that survived.
    pub fn live_count(&self) -> u32 {
        self.new_ids.iter().filter(|id| id.is_some()).count() as u32
    }

    /// Surviving `(old, new)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (DocId, DocId)> + '_ {
        self.new_ids
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|new| (old as DocId, new)))
    }
}

/// Statistics about a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Number of input segments.
    pub segments_merged: usize,
    /// Live documents copied.
    pub docs_copied: u64,
    /// Deleted documents dropped.
    pub deleted_docs_removed: u64,
    /// Distinct terms in the output.
    pub terms_merged: u64,
    /// Wall time in milliseconds.
    pub merge_time_ms: u64,
}

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Metadata of the new segment.
    pub info: SegmentInfo,
    /// One doc map per input, in input order.
    pub doc_maps: Vec<DocMap>,
    /// Statistics.
    pub stats: MergeStats,
}

/// Merge `inputs` into a new segment called `name`.
pub fn merge_segments(
    storage: &dyn Storage,
    inputs: &[SegmentReader],
    name: &str,
) -> Result<MergeOutput> {
    if inputs.is_empty() {
        return Err(GlaiveError::index("merge needs at least one segment"));
    }
    let started = Instant::now();

    let mut doc_maps = Vec::with_capacity(inputs.len());
    let mut base: DocId = 0;
    for reader in inputs {
        let map = DocMap::build(reader, base);
        base = base
            .checked_add(map.live_count())
            .filter(|&total| total < DocId::MAX)
            .ok_or_else(|| GlaiveError::index("merged segment would exceed the doc id space"))?;
        doc_maps.push(map);
    }
    let max_doc = base;

    let source = SegmentSource::Merge {
        inputs: inputs.iter().map(|r| r.name().to_string()).collect(),
    };
    let mut terms_merged = 0u64;
    let info = write_segment(storage, name, source, |writer| {
        // k-way merge of the sorted dictionaries
        let mut heap = BinaryHeap::new();
        for (input, reader) in inputs.iter().enumerate() {
            if !reader.dictionary().is_empty() {
                heap.push(Reverse((reader.dictionary().key(0), input, 0usize)));
            }
        }

        let mut postings: Vec<Posting> = Vec::new();
        while let Some(Reverse((key, _, _))) = heap.peek().copied() {
            postings.clear();
            // pop every input positioned on `key`; ties pop in input order
            while let Some(Reverse((next_key, input, index))) = heap.peek().copied() {
                if next_key != key {
                    break;
                }
                heap.pop();

                let reader = &inputs[input];
                let map = &doc_maps[input];
                for posting in reader.read_postings(reader.dictionary().info(index))? {
                    if let Some(new_id) = map.get(posting.doc_id) {
                        postings.push(Posting::new(new_id, posting.positions));
                    }
                }

                if index + 1 < reader.dictionary().len() {
                    heap.push(Reverse((reader.dictionary().key(index + 1), input, index + 1)));
                }
            }
            if !postings.is_empty() {
                writer.add_term(key, &postings)?;
                terms_merged += 1;
            }
        }

        for (reader, map) in inputs.iter().zip(&doc_maps) {
            for (field, info) in &reader.info().fields {
                writer.add_field_info(field, info)?;
            }
            for (old, new) in map.iter() {
                writer.add_stored(&reader.stored_fields(old)?)?;
                for field in reader.info().fields.keys() {
                    let length = reader.field_length(old, field);
                    if length > 0 {
                        writer.lengths.add(new, field, length);
                    }
                    if let Some(value) = reader.doc_value(old, field) {
                        writer.doc_values.add(new, field, value);
                    }
                }
            }
        }
        Ok(max_doc)
    })?;

    let total_docs: u64 = inputs.iter().map(|r| r.max_doc() as u64).sum();
    let stats = MergeStats {
        segments_merged: inputs.len(),
        docs_copied: max_doc as u64,
        deleted_docs_removed: total_docs - max_doc as u64,
        terms_merged,
        merge_time_ms: started.elapsed().as_millis() as u64,
    };
    debug!(
        "merged {} segments into {name}: {} docs kept, {} deleted docs dropped in {} ms",
        stats.segments_merged, stats.docs_copied, stats.deleted_docs_removed, stats.merge_time_ms
    );

    Ok(MergeOutput {
        info,
        doc_maps,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
    use crate::analysis::analyzer::standard::StandardAnalyzer;
    use crate::document::document::Document;
    use crate::document::field_value::FieldValue;
    use crate::segment::builder::SegmentBuilder;
    use crate::segment::deletions::DeletionBitmap;
    use crate::segment::term::TermKey;
    use crate::storage::memory::MemoryStorage;
    use crate::storage::traits::{FileBytes, StorageOutput};

    fn segment(storage: &MemoryStorage, name: &str, bodies: &[&str]) -> SegmentReader {
        let analyzer = PerFieldAnalyzer::new(Arc::new(StandardAnalyzer::new()));
        let mut builder = SegmentBuilder::new(Arc::new(analyzer));
        for (i, body) in bodies.iter().enumerate() {
            let doc = Document::builder()
                .add_keyword("id", format!("{name}-{i}"))
                .add_integer("rank", i as i64)
                .add_text("body", *body)
                .build();
            builder.add_document(&doc).unwrap();
        }
        builder.flush(storage, name).unwrap();
        SegmentReader::open(storage, name, None).unwrap()
    }

    fn live_docs(reader: &SegmentReader, term: &TermKey) -> Vec<DocId> {
        let mut docs = Vec::new();
        if let Some(mut postings) = reader.postings(term).unwrap() {
            while !postings.is_exhausted() {
                if !reader.is_deleted(postings.doc_id()) {
                    docs.push(postings.doc_id());
                }
                postings.next().unwrap();
            }
        }
        docs
    }

    #[test]
    fn test_merge_drops_deleted_and_renumbers() {
        let storage = MemoryStorage::new();
        let first = segment(&storage, "segment_000001", &["red fox", "blue fox", "red cat"]);
        let second = segment(&storage, "segment_000002", &["green fox", "red bird"]);

        let mut bitmap = DeletionBitmap::new(3);
        bitmap.delete(1).unwrap();
        let first = first.with_deletions(1, Arc::new(bitmap));

        let output =
            merge_segments(&storage, &[first.clone(), second.clone()], "segment_000003").unwrap();
        assert_eq!(output.info.max_doc, 4);
        assert_eq!(output.stats.deleted_docs_removed, 1);
        assert_eq!(output.doc_maps[0].get(1), None);
        assert_eq!(output.doc_maps[0].get(2), Some(1));
        assert_eq!(output.doc_maps[1].get(0), Some(2));

        let merged = SegmentReader::open(&storage, "segment_000003", None).unwrap();
        assert_eq!(live_docs(&merged, &TermKey::main("body", "fox")), vec![0, 2]);
        assert_eq!(live_docs(&merged, &TermKey::main("body", "red")), vec![0, 1, 3]);
        assert!(merged.term_info(&TermKey::main("body", "blue")).is_none());

        // every live input document appears exactly once
        let ids: Vec<String> = (0..merged.max_doc())
            .map(|doc| {
                merged.stored_fields(doc).unwrap().get("id").unwrap().to_string()
            })
            .collect();
        assert_eq!(
            ids,
            vec!["segment_000001-0", "segment_000001-2", "segment_000002-0", "segment_000002-1"]
        );
        assert_eq!(merged.doc_value(3, "rank"), Some(&FieldValue::Integer(1)));
        assert_eq!(merged.field_length(1, "body"), 2);
    }

    /// Storage refusing to create doc values files.
    #[derive(Debug)]
    struct FailingStorage(MemoryStorage);

    impl Storage for FailingStorage {
        fn location(&self) -> &std::path::Path {
            self.0.location()
        }
        fn read_file(&self, name: &str) -> Result<FileBytes> {
            self.0.read_file(name)
        }
        fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
            if name.ends_with(".dv") {
                return Err(GlaiveError::other("disk full"));
            }
            self.0.create_output(name)
        }
        fn file_exists(&self, name: &str) -> bool {
            self.0.file_exists(name)
        }
        fn delete_file(&self, name: &str) -> Result<()> {
            self.0.delete_file(name)
        }
        fn list_files(&self) -> Result<Vec<String>> {
            self.0.list_files()
        }
        fn file_size(&self, name: &str) -> Result<u64> {
            self.0.file_size(name)
        }
        fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
            self.0.rename_file(old_name, new_name)
        }
        fn sync(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_merge_leaves_inputs() {
        let storage = MemoryStorage::new();
        let first = segment(&storage, "segment_000001", &["a b"]);
        let second = segment(&storage, "segment_000002", &["c d"]);
        let before = storage.list_files().unwrap();

        let failing = FailingStorage(storage);
        let result = merge_segments(&failing, &[first, second], "segment_000003");
        assert!(result.is_err());
        assert_eq!(failing.list_files().unwrap(), before);
        assert!(SegmentReader::open(&failing, "segment_000001", None).is_ok());

        assert!(merge_segments(&failing, &[], "segment_000004").is_err());
    }
}
