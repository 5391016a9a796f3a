//! The single writer of an index.
//!
//! Documents are analyzed into an in-memory [`SegmentBuilder`] which is
//! sealed into a segment ("flushed") when it holds `max_buffered_docs`
//! documents or when the writer commits. Deletions mark documents in
//! copy-on-write bitmaps. Nothing becomes visible to searchers before
//! [`IndexWriter::commit`] writes a new manifest and publishes a snapshot.

use std::fmt;
use std::mem;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::MergeSchedulerKind;
use crate::document::Document;
use crate::document::search_fields::{Indexable, SearchFields};
use crate::error::{GlaiveError, Result};
use crate::index::index::IndexInner;
use crate::index::merge_policy::MergePolicy;
use crate::index::scheduler::{
    BackgroundMergeScheduler, FinishedMerge, MergeScheduler, MergeTask, SerialMergeScheduler,
};
use crate::index::snapshot::Snapshot;
use crate::lock::LockHandle;
use crate::query::query::{Query, QueryContext};
use crate::segment::builder::SegmentBuilder;
use crate::segment::deletions::DeletionBitmap;
use crate::segment::manifest::{Manifest, SegmentEntry};
use crate::segment::reader::SegmentReader;
use crate::segment::writer::remove_segment_files;
use crate::segment::{DocId, deletions_file, is_index_file, segment_name};

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    /// Generation of the written manifest.
    pub generation: u64,
    /// Segment now holding the most recently flushed documents of this
    /// commit, `None` when nothing was flushed since the previous commit.
    pub segment: Option<String>,
    /// Number of documents in that last flush.
    pub num_docs: Option<u32>,
}

/// A segment as the writer sees it: possibly with deletions not yet
/// committed.
#[derive(Debug, Clone)]
struct WriterSegment {
    reader: SegmentReader,
    /// Deletions changed since the last commit.
    dirty: bool,
    /// Part of the last committed manifest.
    committed: bool,
}

impl WriterSegment {
    fn entry(&self) -> SegmentEntry {
        SegmentEntry {
            name: self.reader.name().to_string(),
            max_doc: self.reader.max_doc(),
            del_gen: self.reader.del_gen(),
            deleted_count: self.reader.deleted_count(),
        }
    }

    /// Mark `docs`, returning how many were live before.
    fn delete(&mut self, docs: &[DocId]) -> Result<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let mut bitmap = match self.reader.deletions() {
            Some(deletions) => DeletionBitmap::clone(deletions),
            None => DeletionBitmap::new(self.reader.max_doc()),
        };
        let mut deleted = 0;
        for &doc in docs {
            if bitmap.delete(doc)? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.reader = self
                .reader
                .with_deletions(self.reader.del_gen(), Arc::new(bitmap));
            self.dirty = true;
        }
        Ok(deleted)
    }
}

/// A delete recorded against buffered documents: it applies to the first
/// `limit` documents of the buffer once it is flushed.
#[derive(Debug, Clone)]
struct BufferedDelete {
    query: Query,
    limit: DocId,
}

/// A merge handed to the scheduler and not yet installed.
#[derive(Debug, Clone)]
struct RunningMerge {
    inputs: Vec<String>,
    output: String,
}

/// Adds, deletes and merges documents of an [`Index`](crate::index::Index).
///
/// The writer owns the index's write lock until it is dropped. Dropping a
/// writer discards everything since the last commit, after waiting for its
/// background merges.
pub struct IndexWriter {
    inner: Arc<IndexInner>,
    committed: Manifest,
    segments: Vec<WriterSegment>,
    builder: SegmentBuilder,
    buffered_deletes: Vec<BufferedDelete>,
    next_segment: u64,
    merge_policy: Box<dyn MergePolicy>,
    scheduler: Box<dyn MergeScheduler>,
    running: AHashMap<u64, RunningMerge>,
    next_merge_id: u64,
    /// Bumped by rollback so that merges scheduled before are discarded.
    epoch: u64,
    /// Segment holding the documents of the last flush.
    last_flushed: Option<(String, u32)>,
    /// Declared last so it is released after the scheduler's workers are
    /// joined.
    lock: LockHandle,
}

impl fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexWriter")
            .field("location", &self.inner.storage.location())
            .field("generation", &self.committed.generation)
            .field("segments", &self.segments.len())
            .field("buffered_docs", &self.builder.num_docs())
            .field("running_merges", &self.running.len())
            .finish()
    }
}

impl IndexWriter {
    pub(crate) fn open(inner: Arc<IndexInner>) -> Result<Self> {
        let lock = inner
            .lock_factory
            .acquire_write_lock(inner.storage.location())?;

        let snapshot = inner.load_latest()?;
        let committed = snapshot.manifest().clone();
        let segments = snapshot
            .segments()
            .iter()
            .map(|reader| WriterSegment {
                reader: reader.clone(),
                dirty: false,
                committed: true,
            })
            .collect();
        inner.publish(Arc::clone(&snapshot));

        let config = &inner.config.writer;
        let scheduler: Box<dyn MergeScheduler> = match config.merge_scheduler {
            MergeSchedulerKind::Serial => Box::new(SerialMergeScheduler::new()),
            MergeSchedulerKind::Background => Box::new(BackgroundMergeScheduler::new()),
        };
        let merge_policy = config.merge_policy.build();
        info!(
            "Opened writer on {} at generation {} ({} merge policy, {} scheduler)",
            inner.storage.location().display(),
            committed.generation,
            merge_policy.name(),
            scheduler.name()
        );

        let writer = IndexWriter {
            builder: SegmentBuilder::new(Arc::clone(&inner.analyzer)),
            next_segment: committed.next_segment.max(1),
            committed,
            segments,
            buffered_deletes: Vec::new(),
            merge_policy,
            scheduler,
            running: AHashMap::new(),
            next_merge_id: 1,
            epoch: 0,
            last_flushed: None,
            lock,
            inner,
        };
        writer.collect_garbage();
        Ok(writer)
    }

    /// Buffer a document.
    ///
    /// The buffer is flushed into a new segment once it holds
    /// `max_buffered_docs` documents.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        self.check_value_types(&document)?;
        self.builder.add_document(&document)?;
        if self.builder.num_docs() as usize >= self.inner.config.writer.max_buffered_docs {
            debug!("Buffer full with {} documents", self.builder.num_docs());
            self.flush()?;
        }
        Ok(())
    }

    /// Delete every document matching `query`, returning how many live
    /// documents were newly marked.
    ///
    /// Buffered documents are flushed first so that they are matched too.
    pub fn delete_documents(&mut self, query: &Query) -> Result<u64> {
        query.validate()?;
        self.flush()?;
        let deleted = self.delete_in_segments(query)?;
        debug!("Deleted {deleted} documents matching {query}");
        Ok(deleted)
    }

    /// Delete the documents containing an exact term.
    pub fn delete_term(&mut self, field: &str, text: &str) -> Result<u64> {
        self.delete_documents(&Query::term(field, text))
    }

    /// Replace the documents containing an exact term by `document`.
    ///
    /// Both changes become visible with the same commit.
    pub fn update_document(&mut self, field: &str, text: &str, document: Document) -> Result<()> {
        self.replace(Query::term(field, text), document)
    }

    /// Index a host object, replacing any earlier version of it.
    pub fn add_indexable(&mut self, item: &dyn Indexable) -> Result<()> {
        self.replace(indexable_query(item), item.to_document())
    }

    /// Delete a host object from the index.
    pub fn delete_indexable(&mut self, item: &dyn Indexable) -> Result<u64> {
        self.delete_documents(&indexable_query(item))
    }

    fn replace(&mut self, query: Query, document: Document) -> Result<()> {
        query.validate()?;
        self.check_value_types(&document)?;
        self.delete_in_segments(&query)?;
        if !self.builder.is_empty() {
            self.buffered_deletes.push(BufferedDelete {
                query,
                limit: self.builder.num_docs(),
            });
        }
        self.add_document(document)
    }

    /// Reject values whose type differs from the one the field already has
    /// in a flushed segment. The builder checks its own buffer.
    fn check_value_types(&self, document: &Document) -> Result<()> {
        for field in document.fields() {
            let value_type = field.value.value_type();
            for segment in &self.segments {
                if let Some(info) = segment.reader.field_info(&field.name)
                    && info.value_type != value_type
                {
                    return Err(GlaiveError::index(format!(
                        "field {} holds {} values in {}, got {value_type}",
                        field.name,
                        info.value_type,
                        segment.reader.name()
                    )));
                }
            }
        }
        Ok(())
    }

    fn delete_in_segments(&mut self, query: &Query) -> Result<u64> {
        let readers: Vec<SegmentReader> =
            self.segments.iter().map(|s| s.reader.clone()).collect();
        let context = QueryContext::new(&readers, self.inner.config.query.max_clause_count);
        let mut deleted = 0;
        for segment in &mut self.segments {
            let docs = matching_docs(query, &context, &segment.reader, DocId::MAX)?;
            deleted += segment.delete(&docs)?;
        }
        Ok(deleted)
    }

    /// Seal the buffered documents into a new, unpublished segment.
    fn flush(&mut self) -> Result<Option<String>> {
        if self.builder.is_empty() {
            self.buffered_deletes.clear();
            return Ok(None);
        }
        let name = segment_name(self.next_segment);
        self.next_segment += 1;
        let builder = mem::replace(
            &mut self.builder,
            SegmentBuilder::new(Arc::clone(&self.inner.analyzer)),
        );
        let num_docs = builder.num_docs();
        builder.flush(self.inner.storage.as_ref(), &name)?;
        let reader = SegmentReader::open(self.inner.storage.as_ref(), &name, None)?;

        let mut segment = WriterSegment {
            reader,
            dirty: false,
            committed: false,
        };
        let deletes = mem::take(&mut self.buffered_deletes);
        if !deletes.is_empty() {
            let readers = [segment.reader.clone()];
            let context = QueryContext::new(&readers, self.inner.config.query.max_clause_count);
            for delete in &deletes {
                let docs = matching_docs(&delete.query, &context, &segment.reader, delete.limit)?;
                segment.delete(&docs)?;
            }
        }
        info!(
            "Flushed {num_docs} documents into {name} ({} replaced)",
            segment.reader.deleted_count()
        );
        self.segments.push(segment);
        self.last_flushed = Some((name.clone(), num_docs));
        Ok(Some(name))
    }

    /// Make every change since the last commit durable and visible.
    ///
    /// Flushes the buffer, installs finished merges, lets the merge policy
    /// schedule new ones, writes new deletion generations and the manifest,
    /// publishes the new snapshot and removes files nothing refers to.
    pub fn commit(&mut self) -> Result<SegmentRef> {
        self.flush()?;

        let finished = self.scheduler.take_finished();
        self.install_merges(finished, false)?;
        self.schedule_policy_merges()?;
        let finished = self.scheduler.take_finished();
        self.install_merges(finished, false)?;

        let generation = self.committed.generation + 1;
        for segment in self.segments.iter_mut().filter(|s| s.dirty) {
            if let Some(deletions) = segment.reader.deletions().cloned() {
                let file = deletions_file(segment.reader.name(), generation);
                deletions.write(self.inner.storage.as_ref(), &file)?;
                segment.reader = segment.reader.with_deletions(generation, deletions);
            }
        }

        let manifest = Manifest {
            generation,
            segments: self.segments.iter().map(WriterSegment::entry).collect(),
            next_segment: self.next_segment,
            committed_at: Utc::now(),
            user_data: self.committed.user_data.clone(),
        };
        manifest.write(self.inner.storage.as_ref())?;

        for segment in &mut self.segments {
            segment.dirty = false;
            segment.committed = true;
        }
        let readers = self.segments.iter().map(|s| s.reader.clone()).collect();
        let snapshot = Snapshot::new(manifest.clone(), readers);
        info!(
            "Committed generation {generation}: {} segments, {} documents",
            manifest.segments.len(),
            manifest.num_docs()
        );
        self.committed = manifest;
        self.inner.publish(Arc::new(snapshot));
        self.collect_garbage();

        let (segment, num_docs) = match self.last_flushed.take() {
            Some((name, docs)) => (Some(name), Some(docs)),
            None => (None, None),
        };
        Ok(SegmentRef {
            generation,
            segment,
            num_docs,
        })
    }

    /// Discard buffered documents, pending deletions and segments flushed
    /// since the last commit.
    ///
    /// Merges still running are abandoned; their output is removed when
    /// they finish.
    pub fn rollback(&mut self) -> Result<()> {
        self.epoch += 1;
        let discarded_docs = self.builder.num_docs();
        self.builder = SegmentBuilder::new(Arc::clone(&self.inner.analyzer));
        self.buffered_deletes.clear();
        self.last_flushed = None;

        for segment in self.segments.iter().filter(|s| !s.committed) {
            remove_segment_files(self.inner.storage.as_ref(), segment.reader.name());
        }
        let snapshot = Snapshot::open(
            self.inner.storage.as_ref(),
            self.committed.clone(),
            self.inner.config.reader.tolerate_corrupt_segments,
        )?;
        self.segments = snapshot
            .segments()
            .iter()
            .map(|reader| WriterSegment {
                reader: reader.clone(),
                dirty: false,
                committed: true,
            })
            .collect();
        self.running.clear();
        info!(
            "Rolled back to generation {} ({discarded_docs} buffered documents discarded)",
            self.committed.generation
        );
        Ok(())
    }

    /// Merge the named segments into one, then commit.
    pub fn merge(&mut self, names: &[&str]) -> Result<SegmentRef> {
        if names.is_empty() {
            return Err(GlaiveError::index("No segments to merge"));
        }
        self.flush()?;
        let merging = self.merging_segments();
        for name in names {
            if !self.segments.iter().any(|s| s.reader.name() == *name) {
                return Err(GlaiveError::index(format!("Unknown segment {name}")));
            }
            if merging.contains(*name) {
                return Err(GlaiveError::index(format!("Segment {name} is already merging")));
            }
        }
        // keep index order regardless of the order given
        let ordered: Vec<String> = self
            .segments
            .iter()
            .map(|s| s.reader.name())
            .filter(|name| names.contains(name))
            .map(str::to_string)
            .collect();
        self.schedule_merge(ordered)?;
        self.finish_merges()?;
        self.commit()
    }

    /// Merge until at most `max_segments` segments remain, then commit.
    ///
    /// With `max_segments == 1` a single segment holding deletions is
    /// rewritten to purge them.
    pub fn force_merge(&mut self, max_segments: usize) -> Result<SegmentRef> {
        if max_segments == 0 {
            return Err(GlaiveError::index("max_segments must be at least 1"));
        }
        self.flush()?;
        self.finish_merges()?;

        let count = self.segments.len();
        if count > max_segments {
            let tail = count - max_segments + 1;
            let names = self.segments[count - tail..]
                .iter()
                .map(|s| s.reader.name().to_string())
                .collect();
            self.schedule_merge(names)?;
        } else if max_segments == 1
            && let Some(segment) = self.segments.first()
            && segment.reader.deleted_count() > 0
        {
            let name = segment.reader.name().to_string();
            self.schedule_merge(vec![name])?;
        }
        self.finish_merges()?;
        self.commit()
    }

    /// Commit, letting the merge policy schedule whatever merges it finds.
    pub fn maybe_merge(&mut self) -> Result<SegmentRef> {
        self.commit()
    }

    /// Block until running merges finish and install them.
    fn finish_merges(&mut self) -> Result<()> {
        let finished = self.scheduler.wait_all();
        self.install_merges(finished, true)
    }

    fn merging_segments(&self) -> AHashSet<String> {
        self.running
            .values()
            .flat_map(|merge| merge.inputs.iter().cloned())
            .collect()
    }

    fn schedule_policy_merges(&mut self) -> Result<()> {
        let merging = self.merging_segments();
        let idle: Vec<SegmentEntry> = self
            .segments
            .iter()
            .filter(|s| !merging.contains(s.reader.name()))
            .map(WriterSegment::entry)
            .collect();
        for candidate in self.merge_policy.find_merges(&idle) {
            debug!(
                "{} merge policy proposes merging {:?}",
                self.merge_policy.name(),
                candidate.segments
            );
            self.schedule_merge(candidate.segments)?;
        }
        Ok(())
    }

    fn schedule_merge(&mut self, names: Vec<String>) -> Result<()> {
        let inputs: Vec<SegmentReader> = names
            .iter()
            .filter_map(|name| {
                self.segments
                    .iter()
                    .find(|s| s.reader.name() == name)
                    .map(|s| s.reader.clone())
            })
            .collect();
        if inputs.len() != names.len() {
            return Err(GlaiveError::index(format!("Cannot merge unknown segments {names:?}")));
        }
        let id = self.next_merge_id;
        self.next_merge_id += 1;
        let output = segment_name(self.next_segment);
        self.next_segment += 1;

        self.running.insert(
            id,
            RunningMerge {
                inputs: names,
                output: output.clone(),
            },
        );
        let task = MergeTask {
            id,
            epoch: self.epoch,
            inputs,
            output,
        };
        if let Err(e) = self.scheduler.schedule(Arc::clone(&self.inner.storage), task) {
            self.running.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Swap finished merges into the segment list.
    ///
    /// Failed merges are logged and dropped unless `strict`, in which case
    /// the first failure is returned after the others were handled.
    fn install_merges(&mut self, finished: Vec<FinishedMerge>, strict: bool) -> Result<()> {
        let mut first_error = None;
        for merge in finished {
            if let Err(e) = self.install_merge(merge) {
                warn!("Merge failed: {e}");
                if strict {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn install_merge(&mut self, merge: FinishedMerge) -> Result<()> {
        let FinishedMerge { task, result } = merge;
        let storage = self.inner.storage.as_ref();
        let running = self.running.remove(&task.id);
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                remove_segment_files(storage, &task.output);
                return Err(e);
            }
        };
        if task.epoch != self.epoch || running.is_none() {
            debug!("Discarding merge into {} started before rollback", task.output);
            remove_segment_files(storage, &task.output);
            return Ok(());
        }

        let mut positions = Vec::with_capacity(task.inputs.len());
        for input in &task.inputs {
            match self.segments.iter().position(|s| s.reader.name() == input.name()) {
                Some(position) => positions.push(position),
                None => {
                    remove_segment_files(storage, &task.output);
                    return Err(GlaiveError::index(format!(
                        "Merge input {} disappeared",
                        input.name()
                    )));
                }
            }
        }

        // deletions made while the merge ran
        let mut carried = Vec::new();
        for ((input, doc_map), &position) in task.inputs.iter().zip(&output.doc_maps).zip(&positions) {
            if let Some(current) = self.segments[position].reader.deletions() {
                for doc in current.deleted_docs() {
                    if !input.is_deleted(doc)
                        && let Some(new_doc) = doc_map.get(doc)
                    {
                        carried.push(new_doc);
                    }
                }
            }
        }

        let first = positions.iter().copied().min().unwrap_or(0);
        let mut index = 0;
        self.segments.retain(|_| {
            let keep = !positions.contains(&index);
            index += 1;
            keep
        });

        if output.info.max_doc == 0 {
            remove_segment_files(storage, &task.output);
        } else {
            let reader = SegmentReader::open(storage, &task.output, None)?;
            let mut segment = WriterSegment {
                reader,
                dirty: false,
                committed: false,
            };
            segment.delete(&carried)?;
            self.segments.insert(first.min(self.segments.len()), segment);
        }

        if let Some((flushed, _)) = &mut self.last_flushed
            && task.inputs.iter().any(|input| input.name() == flushed.as_str())
        {
            *flushed = task.output.clone();
        }
        info!(
            "Merged {} segments into {}: {} documents copied, {} deleted documents dropped, {} carried over in {} ms",
            output.stats.segments_merged,
            task.output,
            output.stats.docs_copied,
            output.stats.deleted_docs_removed,
            carried.len(),
            output.stats.merge_time_ms
        );
        Ok(())
    }

    /// Remove index files the last commit does not refer to.
    ///
    /// Outputs of running merges are kept.
    fn collect_garbage(&self) {
        let storage = self.inner.storage.as_ref();
        let files = match storage.list_files() {
            Ok(files) => files,
            Err(e) => {
                warn!("Cannot list index files: {e}");
                return;
            }
        };
        let referenced = self.committed.referenced_files();
        let running: Vec<&str> = self.running.values().map(|m| m.output.as_str()).collect();
        let unpublished: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| !s.committed)
            .map(|s| s.reader.name())
            .collect();
        let mut removed = 0;
        for file in files {
            if !is_index_file(&file) || referenced.contains(&file) {
                continue;
            }
            let stem = file.split('.').next().unwrap_or(&file);
            if running.contains(&stem) || unpublished.contains(&stem) {
                continue;
            }
            match storage.delete_file(&file) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Cannot remove {file}: {e}"),
            }
        }
        if removed > 0 {
            debug!("Removed {removed} unreferenced files");
        }
    }

    /// Documents buffered in memory.
    pub fn num_buffered_docs(&self) -> u32 {
        self.builder.num_docs()
    }

    /// Live documents the next commit would publish.
    pub fn num_docs(&self) -> u64 {
        self.segments
            .iter()
            .map(|s| u64::from(s.reader.num_docs()))
            .sum::<u64>()
            + u64::from(self.builder.num_docs())
    }

    /// Names of the segments known to the writer, in index order.
    pub fn segment_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| s.reader.name().to_string())
            .collect()
    }

    /// Merges scheduled but not yet installed.
    pub fn pending_merges(&self) -> usize {
        self.running.len()
    }

    /// The last committed manifest.
    pub fn committed(&self) -> &Manifest {
        &self.committed
    }

    /// Set a key stored with the next commit.
    pub fn set_user_data<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.committed.user_data.insert(key.into(), value.into());
    }

    /// Give up the writer and its lock without committing.
    pub fn close(mut self) -> Result<()> {
        self.abandon_merges();
        self.lock.release()
    }

    /// Wait for scheduled merges and delete their uninstalled outputs.
    fn abandon_merges(&mut self) {
        let finished = self.scheduler.wait_all();
        if !finished.is_empty() {
            debug!("Discarding {} merges that were never installed", finished.len());
        }
        for merge in finished {
            remove_segment_files(self.inner.storage.as_ref(), &merge.task.output);
        }
        self.running.clear();
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        self.abandon_merges();
    }
}

fn indexable_query(item: &dyn Indexable) -> Query {
    Query::boolean()
        .must(Query::term(SearchFields::IDENTIFIER, item.index_identifier()))
        .must(Query::term(SearchFields::OBJECT_TYPE, item.index_type().to_string()))
        .build()
        .into()
}

/// Live documents of `segment` below `limit` matching `query`.
fn matching_docs(
    query: &Query,
    context: &QueryContext<'_>,
    segment: &SegmentReader,
    limit: DocId,
) -> Result<Vec<DocId>> {
    let mut matcher = query.matcher(context, segment)?;
    let mut docs = Vec::new();
    while !matcher.is_exhausted() && matcher.doc_id() < limit {
        docs.push(matcher.doc_id());
        matcher.next()?;
    }
    Ok(docs)
}
