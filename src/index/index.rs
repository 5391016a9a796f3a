//! The index handle tying storage, configuration and snapshots together.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;

use crate::analysis::analyzer::per_field::PerFieldAnalyzer;
use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::reader::IndexReader;
use crate::index::snapshot::Snapshot;
use crate::index::writer::IndexWriter;
use crate::lock::LockFactory;
use crate::query::parser::QueryParser;
use crate::query::searcher::Searcher;
use crate::segment::manifest::Manifest;
use crate::storage::{FileStorage, FileStorageConfig, MemoryStorage, Storage};

/// State shared by an index handle, its writer and its readers.
#[derive(Debug)]
pub(crate) struct IndexInner {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) config: IndexConfig,
    pub(crate) analyzer: Arc<PerFieldAnalyzer>,
    pub(crate) lock_factory: Arc<dyn LockFactory>,
    /// Newest snapshot published in this process.
    pub(crate) published: RwLock<Arc<Snapshot>>,
}

impl IndexInner {
    pub(crate) fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.published.read())
    }

    /// Replace the published snapshot unless a newer one is already there.
    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        let mut published = self.published.write();
        if snapshot.generation() >= published.generation() {
            *published = snapshot;
        }
    }

    /// Open the newest commit in storage.
    pub(crate) fn load_latest(&self) -> Result<Arc<Snapshot>> {
        let snapshot = match Manifest::load_latest(self.storage.as_ref())? {
            Some(manifest) => Snapshot::open(
                self.storage.as_ref(),
                manifest,
                self.config.reader.tolerate_corrupt_segments,
            )?,
            None => Snapshot::empty(),
        };
        Ok(Arc::new(snapshot))
    }
}

/// An index: a directory (or memory area) of segments plus its settings.
///
/// The handle is cheap to clone. Any number of readers and searchers may be
/// created from it; at most one [`IndexWriter`] can exist per index location
/// at a time.
///
/// ```
/// use glaive::config::IndexConfig;
/// use glaive::document::Document;
/// use glaive::index::Index;
/// use glaive::query::Query;
///
/// let index = Index::open_in_memory(IndexConfig::default()).unwrap();
/// let mut writer = index.writer().unwrap();
/// writer.add_document(Document::builder().add_text("body", "The quick fox").build()).unwrap();
/// writer.commit().unwrap();
///
/// let hits = index.searcher().search(&Query::term("body", "quick"), None, 10).unwrap();
/// assert_eq!(hits.total_hits(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

impl Index {
    /// Open or create an index in a directory.
    pub fn open<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        let storage_config = FileStorageConfig {
            use_mmap: config.reader.use_mmap,
            ..Default::default()
        };
        let storage = FileStorage::new(path.as_ref(), storage_config)?;
        info!("Opening index at {}", path.as_ref().display());
        Self::build(Arc::new(storage), config, false)
    }

    /// Create an empty index held in memory.
    pub fn open_in_memory(config: IndexConfig) -> Result<Self> {
        Self::build(Arc::new(MemoryStorage::new()), config, true)
    }

    /// Open an index on any storage backend.
    pub fn with_storage(storage: Arc<dyn Storage>, config: IndexConfig) -> Result<Self> {
        let in_memory = storage
            .location()
            .to_string_lossy()
            .starts_with("memory://");
        Self::build(storage, config, in_memory)
    }

    fn build(storage: Arc<dyn Storage>, config: IndexConfig, in_memory: bool) -> Result<Self> {
        config.validate()?;
        let analyzer = config.analysis.build_analyzer()?;
        let lock_factory = config.lock.build(in_memory);
        let inner = IndexInner {
            storage,
            config,
            analyzer,
            lock_factory,
            published: RwLock::new(Arc::new(Snapshot::empty())),
        };
        let snapshot = inner.load_latest()?;
        debug!(
            "Index at {} has generation {} with {} documents",
            inner.storage.location().display(),
            snapshot.generation(),
            snapshot.num_docs()
        );
        inner.publish(snapshot);
        Ok(Index {
            inner: Arc::new(inner),
        })
    }

    /// Open the single writer of this index.
    ///
    /// Fails with [`GlaiveError::LockContention`](crate::error::GlaiveError)
    /// when another writer holds the lock.
    pub fn writer(&self) -> Result<IndexWriter> {
        IndexWriter::open(Arc::clone(&self.inner))
    }

    /// A reader pinned to the newest published snapshot.
    pub fn reader(&self) -> IndexReader {
        IndexReader::new(Arc::clone(&self.inner))
    }

    /// A searcher over the newest published snapshot.
    pub fn searcher(&self) -> Searcher {
        Searcher::new(self.snapshot(), self.inner.config.query.max_clause_count)
    }

    /// The newest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.current()
    }

    /// Pick up commits made through another handle or process.
    pub fn refresh(&self) -> Result<()> {
        let latest = Manifest::generations(self.inner.storage.as_ref())?
            .last()
            .copied()
            .unwrap_or(0);
        if latest > self.inner.current().generation() {
            let snapshot = self.inner.load_latest()?;
            self.inner.publish(snapshot);
        }
        Ok(())
    }

    /// A query parser using the index's analyzers and default fields.
    pub fn query_parser(&self) -> QueryParser {
        let query = &self.inner.config.query;
        QueryParser::new(Arc::clone(&self.inner.analyzer), query.default_fields.iter())
            .with_default_operator(query.default_operator)
    }

    /// Configuration the index was opened with.
    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    /// Analyzer applied to documents and parsed queries.
    pub fn analyzer(&self) -> &Arc<PerFieldAnalyzer> {
        &self.inner.analyzer
    }

    /// Storage backend.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    /// Whether a writer currently holds the write lock.
    pub fn is_locked(&self) -> Result<bool> {
        self.inner
            .lock_factory
            .is_locked(self.inner.storage.location())
    }
}
