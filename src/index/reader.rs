//! Point-in-time readers.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::index::index::IndexInner;
use crate::index::snapshot::Snapshot;
use crate::query::searcher::Searcher;
use crate::segment::manifest::Manifest;
use crate::segment::stored::StoredFields;
use crate::segment::DocAddress;

/// A reader pinned to one snapshot of an index.
///
/// Commits made after the reader was created stay invisible until
/// [`IndexReader::reload`] is called.
#[derive(Debug, Clone)]
pub struct IndexReader {
    inner: Arc<IndexInner>,
    snapshot: Arc<Snapshot>,
}

impl IndexReader {
    pub(crate) fn new(inner: Arc<IndexInner>) -> Self {
        let snapshot = inner.current();
        IndexReader { inner, snapshot }
    }

    /// The pinned snapshot.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Generation of the pinned commit.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }

    /// Live documents.
    pub fn num_docs(&self) -> u64 {
        self.snapshot.num_docs()
    }

    /// Documents including deleted ones.
    pub fn max_doc(&self) -> u64 {
        self.snapshot.max_doc()
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.snapshot.segments().len()
    }

    /// Stored fields of a document.
    pub fn doc(&self, address: DocAddress) -> Result<StoredFields> {
        self.snapshot.doc(address)
    }

    /// A searcher over the pinned snapshot.
    pub fn searcher(&self) -> Searcher {
        Searcher::new(
            Arc::clone(&self.snapshot),
            self.inner.config.query.max_clause_count,
        )
    }

    /// Move to the newest commit, returning whether anything changed.
    ///
    /// Commits published in this process are picked up directly; commits
    /// made by another process are opened from storage.
    pub fn reload(&mut self) -> Result<bool> {
        let mut latest = self.inner.current();
        let on_disk = Manifest::generations(self.inner.storage.as_ref())?
            .last()
            .copied()
            .unwrap_or(0);
        if on_disk > latest.generation() {
            latest = self.inner.load_latest()?;
            self.inner.publish(Arc::clone(&latest));
        }
        if latest.generation() == self.snapshot.generation() {
            return Ok(false);
        }
        debug!(
            "Reader moved from generation {} to {}",
            self.snapshot.generation(),
            latest.generation()
        );
        self.snapshot = latest;
        Ok(true)
    }
}
