//! Immutable point-in-time views of an index.

use std::sync::Arc;

use log::{debug, warn};

use crate::error::{GlaiveError, Result};
use crate::query::query::DEFAULT_MAX_CLAUSE_COUNT;
use crate::query::searcher::Searcher;
use crate::segment::manifest::Manifest;
use crate::segment::reader::SegmentReader;
use crate::segment::stored::StoredFields;
use crate::segment::{DocAddress, DocId};
use crate::storage::Storage;

/// The segments of one commit, opened and ready to search.
///
/// A snapshot never changes. Commits publish a new one; searchers holding
/// the old `Arc` keep seeing the old documents.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    manifest: Manifest,
    segments: Vec<SegmentReader>,
}

impl Snapshot {
    /// A snapshot of an index without commits.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a snapshot from already opened segments.
    pub fn new(manifest: Manifest, segments: Vec<SegmentReader>) -> Self {
        Snapshot { manifest, segments }
    }

    /// Open every segment named by the manifest.
    ///
    /// With `tolerate_corrupt` a segment that fails validation is skipped
    /// with a warning instead of failing the open.
    pub fn open(storage: &dyn Storage, manifest: Manifest, tolerate_corrupt: bool) -> Result<Self> {
        let mut segments = Vec::with_capacity(manifest.segments.len());
        for entry in &manifest.segments {
            let del_gen = (entry.del_gen > 0).then_some(entry.del_gen);
            match SegmentReader::open(storage, &entry.name, del_gen) {
                Ok(segment) => segments.push(segment),
                Err(e) if tolerate_corrupt && e.is_corrupt_segment() => {
                    warn!("Skipping unreadable segment {}: {e}", entry.name);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "Opened snapshot generation {} with {} segments",
            manifest.generation,
            segments.len()
        );
        Ok(Snapshot { manifest, segments })
    }

    /// The commit this snapshot reflects.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Generation of the commit, 0 before the first commit.
    pub fn generation(&self) -> u64 {
        self.manifest.generation
    }

    /// Segments, oldest first.
    pub fn segments(&self) -> &[SegmentReader] {
        &self.segments
    }

    /// Segment by ordinal.
    pub fn segment(&self, segment_ord: u32) -> Option<&SegmentReader> {
        self.segments.get(segment_ord as usize)
    }

    /// Live documents.
    pub fn num_docs(&self) -> u64 {
        self.segments.iter().map(|s| u64::from(s.num_docs())).sum()
    }

    /// Documents including deleted ones.
    pub fn max_doc(&self) -> u64 {
        self.segments.iter().map(|s| u64::from(s.max_doc())).sum()
    }

    /// Stored fields of a document.
    pub fn doc(&self, address: DocAddress) -> Result<StoredFields> {
        let segment = self.segment(address.segment_ord).ok_or_else(|| {
            GlaiveError::index(format!("No segment with ordinal {}", address.segment_ord))
        })?;
        check_doc(segment, address.doc_id)?;
        segment.stored_fields(address.doc_id)
    }

    /// A searcher over this snapshot.
    pub fn searcher(self: &Arc<Self>) -> Searcher {
        Searcher::new(Arc::clone(self), DEFAULT_MAX_CLAUSE_COUNT)
    }
}

fn check_doc(segment: &SegmentReader, doc_id: DocId) -> Result<()> {
    if doc_id >= segment.max_doc() {
        return Err(GlaiveError::index(format!(
            "Document {doc_id} out of range for segment {}",
            segment.name()
        )));
    }
    Ok(())
}
