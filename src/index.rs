//! Index handles, writers, readers and merging.
//!
//! An [`Index`] owns the storage and configuration. It hands out one
//! [`IndexWriter`] at a time and any number of [`IndexReader`]s and
//! searchers, each pinned to an immutable [`Snapshot`].

#[allow(clippy::module_inception)]
pub mod index;
pub mod merge_policy;
pub mod reader;
pub mod scheduler;
pub mod snapshot;
pub mod writer;

pub use index::Index;
pub use merge_policy::{LogMergePolicy, MergeCandidate, MergePolicy, NoMergePolicy};
pub use reader::IndexReader;
pub use scheduler::{BackgroundMergeScheduler, MergeScheduler, SerialMergeScheduler};
pub use snapshot::Snapshot;
pub use writer::{IndexWriter, SegmentRef};
