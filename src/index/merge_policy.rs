//! Merge policies deciding which segments to merge.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::segment::manifest::SegmentEntry;

/// A set of segments proposed for one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCandidate {
    /// Segment names in index order.
    pub segments: Vec<String>,
}

/// Trait for defining merge policies.
pub trait MergePolicy: Send + Sync + fmt::Debug {
    /// Propose merges among `segments` (oldest first, none already merging).
    fn find_merges(&self, segments: &[SegmentEntry]) -> Vec<MergeCandidate>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

/// Never merges on its own; merges only happen on request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMergePolicy;

impl MergePolicy for NoMergePolicy {
    fn find_merges(&self, _segments: &[SegmentEntry]) -> Vec<MergeCandidate> {
        Vec::new()
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Merges runs of similarly sized segments.
///
/// Segments fall into logarithmic size levels (base `merge_factor`, by live
/// document count, small segments rounded up to `min_merge_docs`). Whenever
/// `merge_factor` adjacent segments share a level they are merged into one
/// segment of the next level. Segments above `max_merge_docs` are left
/// alone, and a segment whose deleted share exceeds `max_deleted_ratio` is
/// rewritten on its own to drop the deleted documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMergePolicy {
    /// Number of same-level segments merged at once.
    pub merge_factor: usize,
    /// Segments smaller than this count as this size.
    pub min_merge_docs: u32,
    /// Segments larger than this are never merged.
    pub max_merge_docs: u32,
    /// Deleted share above which a segment is rewritten alone.
    pub max_deleted_ratio: f64,
}

impl Default for LogMergePolicy {
    fn default() -> Self {
        LogMergePolicy {
            merge_factor: 10,
            min_merge_docs: 1000,
            max_merge_docs: u32::MAX,
            max_deleted_ratio: 0.5,
        }
    }
}

impl LogMergePolicy {
    /// Create a policy with a merge factor and the remaining defaults.
    pub fn new(merge_factor: usize) -> Self {
        LogMergePolicy {
            merge_factor,
            ..Default::default()
        }
    }

    fn level(&self, entry: &SegmentEntry) -> u32 {
        let size = f64::from(entry.num_docs().max(self.min_merge_docs).max(1));
        let base = (self.merge_factor.max(2)) as f64;
        (size.ln() / base.ln()).floor() as u32
    }

    fn is_oversized(&self, entry: &SegmentEntry) -> bool {
        entry.num_docs() > self.max_merge_docs
    }

    fn deleted_ratio(entry: &SegmentEntry) -> f64 {
        if entry.max_doc == 0 {
            0.0
        } else {
            f64::from(entry.deleted_count) / f64::from(entry.max_doc)
        }
    }
}

impl MergePolicy for LogMergePolicy {
    fn find_merges(&self, segments: &[SegmentEntry]) -> Vec<MergeCandidate> {
        let factor = self.merge_factor.max(2);
        let mut candidates = Vec::new();
        let mut taken = vec![false; segments.len()];

        let mut start = 0;
        while start < segments.len() {
            if self.is_oversized(&segments[start]) {
                start += 1;
                continue;
            }
            let level = self.level(&segments[start]);
            let mut end = start + 1;
            while end < segments.len()
                && end - start < factor
                && !self.is_oversized(&segments[end])
                && self.level(&segments[end]) == level
            {
                end += 1;
            }
            if end - start == factor {
                candidates.push(MergeCandidate {
                    segments: segments[start..end].iter().map(|s| s.name.clone()).collect(),
                });
                taken[start..end].iter_mut().for_each(|t| *t = true);
                start = end;
            } else {
                start += 1;
            }
        }

        for (entry, taken) in segments.iter().zip(taken) {
            if !taken && entry.deleted_count > 0 && Self::deleted_ratio(entry) > self.max_deleted_ratio {
                candidates.push(MergeCandidate {
                    segments: vec![entry.name.clone()],
                });
            }
        }
        candidates
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(sizes: &[u32]) -> Vec<SegmentEntry> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| SegmentEntry::new(format!("segment_{:06}", i + 1), *size))
            .collect()
    }

    #[test]
    fn test_merges_runs_of_one_level() {
        let policy = LogMergePolicy {
            merge_factor: 3,
            min_merge_docs: 1,
            ..Default::default()
        };
        // levels: 2, 0, 0, 0, 0
        let merges = policy.find_merges(&entries(&[10, 1, 2, 2, 1]));
        assert_eq!(merges.len(), 1);
        assert_eq!(
            merges[0].segments,
            vec!["segment_000002", "segment_000003", "segment_000004"]
        );

        assert!(policy.find_merges(&entries(&[1, 1])).is_empty());
        assert!(NoMergePolicy.find_merges(&entries(&[1, 1, 1])).is_empty());
    }

    #[test]
    fn test_oversized_and_deleted_segments() {
        let policy = LogMergePolicy {
            merge_factor: 2,
            min_merge_docs: 1,
            max_merge_docs: 100,
            max_deleted_ratio: 0.5,
        };
        let mut segments = entries(&[500, 500, 40]);
        segments[2].deleted_count = 30;
        let merges = policy.find_merges(&segments);
        assert_eq!(merges, vec![MergeCandidate { segments: vec!["segment_000003".to_string()] }]);
    }
}
