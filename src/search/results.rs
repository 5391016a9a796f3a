//! The outcome of one query execution.

use std::sync::Arc;
use std::vec;

use crate::error::Result;
use crate::index::snapshot::Snapshot;
use crate::query::collector::ScoredHit;
use crate::search::result::{Projection, SearchResult};

/// A page of hits over the snapshot the query ran on.
///
/// Iterating consumes the results; stored fields are read from the segment
/// for each hit as it is yielded and are not kept afterwards. Dropping the
/// iterator early skips loading the remaining hits.
#[derive(Debug)]
pub struct SearchResults {
    snapshot: Arc<Snapshot>,
    total_hits: u64,
    hits: Vec<ScoredHit>,
    projections: Vec<Projection>,
}

impl SearchResults {
    pub(crate) fn new(
        snapshot: Arc<Snapshot>,
        total_hits: u64,
        hits: Vec<ScoredHit>,
        projections: Vec<Projection>,
    ) -> Self {
        SearchResults {
            snapshot,
            total_hits,
            hits,
            projections,
        }
    }

    /// Number of documents that matched, beyond the returned page.
    pub fn total_hits(&self) -> u64 {
        self.total_hits
    }

    /// Number of hits in the page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the page is empty.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Addresses and scores of the page, best first.
    pub fn hits(&self) -> &[ScoredHit] {
        &self.hits
    }

    /// The snapshot the query ran on.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub(crate) fn projections(&self) -> &[Projection] {
        &self.projections
    }
}

impl IntoIterator for SearchResults {
    type Item = Result<SearchResult>;
    type IntoIter = SearchResultsIter;

    fn into_iter(self) -> Self::IntoIter {
        SearchResultsIter {
            snapshot: self.snapshot,
            hits: self.hits.into_iter(),
            projections: self.projections,
        }
    }
}

/// Forward-only iterator loading one hit at a time.
#[derive(Debug)]
pub struct SearchResultsIter {
    snapshot: Arc<Snapshot>,
    hits: vec::IntoIter<ScoredHit>,
    projections: Vec<Projection>,
}

impl Iterator for SearchResultsIter {
    type Item = Result<SearchResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let hit = self.hits.next()?;
        Some(
            self.snapshot
                .doc(hit.address)
                .map(|stored| SearchResult::from_stored(hit.address, hit.score, stored, &self.projections)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl ExactSizeIterator for SearchResultsIter {}
