//! Collector implementations for gathering search results.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::error::Result;
use crate::query::sort::{SortDescriptor, SortDirection, SortValue};
use crate::segment::reader::SegmentReader;
use crate::segment::{DocAddress, DocId};

/// Trait for collecting search results.
pub trait Collector: Send + Debug {
    /// Collect one matching document.
    fn collect(
        &mut self,
        segment_ord: u32,
        segment: &SegmentReader,
        doc_id: DocId,
        score: f32,
    ) -> Result<()>;

    /// Get the total number of hits collected.
    fn total_hits(&self) -> u64;
}

/// A collected document with its sort keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    /// Where the document lives.
    pub address: DocAddress,
    /// Relevance score.
    pub score: f32,
    /// One key per sort descriptor.
    pub keys: Vec<SortValue>,
}

/// A collector that keeps the best `limit` hits.
///
/// Without sort descriptors hits are ranked by score, highest first. Ties
/// are always broken by ascending address. Hits are gathered in a buffer
/// that is pruned back to `limit` entries whenever it doubles, keeping the
/// cost linear in the number of matches.
#[derive(Debug)]
pub struct TopHitsCollector {
    limit: usize,
    sorts: Vec<SortDescriptor>,
    hits: Vec<ScoredHit>,
    total_hits: u64,
}

impl TopHitsCollector {
    /// Keep the top `limit` hits by score.
    pub fn new(limit: usize) -> Self {
        Self::with_sort(limit, Vec::new())
    }

    /// Keep the top `limit` hits in the order given by `sorts`.
    pub fn with_sort(limit: usize, sorts: Vec<SortDescriptor>) -> Self {
        let sorts = if sorts.is_empty() {
            vec![SortDescriptor::by_score()]
        } else {
            sorts
        };
        TopHitsCollector {
            limit,
            sorts,
            hits: Vec::new(),
            total_hits: 0,
        }
    }

    /// Maximum number of hits kept.
    pub fn limit(&self) -> usize {
        self.limit
    }

    fn compare(&self, a: &ScoredHit, b: &ScoredHit) -> Ordering {
        compare_hits(&self.sorts, a, b)
    }

    fn prune(&mut self) {
        if self.hits.len() <= self.limit {
            return;
        }
        let sorts = &self.sorts;
        self.hits
            .select_nth_unstable_by(self.limit - 1, |a, b| compare_hits(sorts, a, b));
        self.hits.truncate(self.limit);
    }

    /// The kept hits, best first.
    pub fn into_hits(mut self) -> Vec<ScoredHit> {
        if self.limit == 0 {
            return Vec::new();
        }
        self.prune();
        let mut hits = std::mem::take(&mut self.hits);
        hits.sort_unstable_by(|a, b| self.compare(a, b));
        hits
    }
}

fn compare_hits(sorts: &[SortDescriptor], a: &ScoredHit, b: &ScoredHit) -> Ordering {
    for (i, sort) in sorts.iter().enumerate() {
        let ordering = if sort.is_doc_order() {
            match sort.direction {
                SortDirection::Ascending => a.address.cmp(&b.address),
                SortDirection::Descending => b.address.cmp(&a.address),
            }
        } else {
            sort.compare(&a.keys[i], &b.keys[i])
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.address.cmp(&b.address)
}

impl Collector for TopHitsCollector {
    fn collect(
        &mut self,
        segment_ord: u32,
        segment: &SegmentReader,
        doc_id: DocId,
        score: f32,
    ) -> Result<()> {
        self.total_hits += 1;
        if self.limit == 0 {
            return Ok(());
        }
        let keys = self
            .sorts
            .iter()
            .map(|sort| sort.key(segment, doc_id, score))
            .collect();
        self.hits.push(ScoredHit {
            address: DocAddress::new(segment_ord, doc_id),
            score,
            keys,
        });
        if self.hits.len() >= self.limit.saturating_mul(2).max(64) {
            self.prune();
        }
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.total_hits
    }
}

/// A collector that only counts matches.
#[derive(Debug, Default)]
pub struct CountCollector {
    count: u64,
}

impl CountCollector {
    /// Create a new count collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matches seen.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Collector for CountCollector {
    fn collect(&mut self, _: u32, _: &SegmentReader, _: DocId, _: f32) -> Result<()> {
        self.count += 1;
        Ok(())
    }

    fn total_hits(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::query::testing;
    use crate::query::sort::SortType;
    use crate::storage::memory::MemoryStorage;

    fn collect(collector: &mut dyn Collector, segment: &SegmentReader, scores: &[f32]) {
        for (doc_id, score) in scores.iter().enumerate() {
            collector.collect(0, segment, doc_id as DocId, *score).unwrap();
        }
    }

    #[test]
    fn test_top_hits_by_score_with_ties() {
        let storage = MemoryStorage::new();
        let bodies = ["x"; 200];
        let segment = testing::segment(&storage, "segment_000001", &bodies);
        let scores: Vec<f32> = (0..200).map(|i| (i % 7) as f32).collect();

        let mut collector = TopHitsCollector::new(3);
        collect(&mut collector, &segment, &scores);
        assert_eq!(collector.total_hits(), 200);
        let docs: Vec<DocId> = collector.into_hits().iter().map(|h| h.address.doc_id).collect();
        assert_eq!(docs, vec![6, 13, 20]);
    }

    #[test]
    fn test_sorted_by_doc_value() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &["a", "b", "c", "d"]);
        let mut collector =
            TopHitsCollector::with_sort(2, vec![SortDescriptor::descending("rank", SortType::Integer)]);
        collect(&mut collector, &segment, &[1.0, 1.0, 1.0, 1.0]);
        let docs: Vec<DocId> = collector.into_hits().iter().map(|h| h.address.doc_id).collect();
        assert_eq!(docs, vec![3, 2]);
    }

    #[test]
    fn test_zero_limit_counts_only() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", &["a", "b"]);
        let mut collector = TopHitsCollector::new(0);
        collect(&mut collector, &segment, &[1.0, 2.0]);
        assert_eq!(collector.total_hits(), 2);
        assert!(collector.into_hits().is_empty());

        let mut counter = CountCollector::new();
        collect(&mut counter, &segment, &[1.0, 2.0]);
        assert_eq!(counter.count(), 2);
    }
}
