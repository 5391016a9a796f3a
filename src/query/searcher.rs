//! Query execution over a snapshot.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::document::field_value::ValueType;
use crate::error::Result;
use crate::index::snapshot::Snapshot;
use crate::query::collector::{Collector, CountCollector, TopHitsCollector};
use crate::query::query::{Query, QueryContext};
use crate::query::sort::SortDescriptor;
use crate::search::result::Projection;
use crate::search::results::SearchResults;
use crate::segment::DocAddress;
use crate::segment::stored::StoredFields;

/// Default page size of a [`SearchRequest`].
pub const DEFAULT_LIMIT: usize = 10;

/// A query with paging, ordering and projection options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The query to run.
    pub query: Query,
    /// Number of leading hits to skip.
    #[serde(default)]
    pub offset: usize,
    /// Maximum number of hits returned.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Sort keys; relevance when empty.
    #[serde(default)]
    pub sort: Vec<SortDescriptor>,
    /// Stored fields to load; all stored fields when empty.
    #[serde(default)]
    pub projections: Vec<Projection>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl SearchRequest {
    /// Request the first page of hits for a query.
    pub fn new<Q: Into<Query>>(query: Q) -> Self {
        SearchRequest {
            query: query.into(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            sort: Vec::new(),
            projections: Vec::new(),
        }
    }

    /// Skip hits.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Limit the number of hits.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Append a sort key.
    pub fn sort_by(mut self, sort: SortDescriptor) -> Self {
        self.sort.push(sort);
        self
    }

    /// Load a stored field coerced to a type.
    pub fn project<F: Into<String>>(mut self, field: F, value_type: ValueType) -> Self {
        self.projections.push(Projection::new(field, value_type));
        self
    }
}

/// Runs queries against one snapshot.
///
/// A searcher is cheap to clone and never observes later commits.
#[derive(Debug, Clone)]
pub struct Searcher {
    snapshot: Arc<Snapshot>,
    max_clause_count: usize,
}

impl Searcher {
    /// Create a searcher.
    pub fn new(snapshot: Arc<Snapshot>, max_clause_count: usize) -> Self {
        Searcher {
            snapshot,
            max_clause_count,
        }
    }

    /// The searched snapshot.
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    /// Live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        self.snapshot.num_docs()
    }

    /// Top `max_results` hits, by score or by one sort key.
    pub fn search(
        &self,
        query: &Query,
        sort: Option<&SortDescriptor>,
        max_results: usize,
    ) -> Result<SearchResults> {
        let mut request = SearchRequest::new(query.clone()).limit(max_results);
        if let Some(sort) = sort {
            request = request.sort_by(sort.clone());
        }
        self.execute(&request)
    }

    /// Run a full request.
    pub fn execute(&self, request: &SearchRequest) -> Result<SearchResults> {
        let window = request.offset.saturating_add(request.limit);
        let mut collector = TopHitsCollector::with_sort(window, request.sort.clone());
        self.collect(&request.query, &mut collector)?;

        let total_hits = collector.total_hits();
        let hits: Vec<_> = collector.into_hits().into_iter().skip(request.offset).collect();
        debug!(
            "Query {} matched {total_hits} documents, returning {}",
            request.query,
            hits.len()
        );
        Ok(SearchResults::new(
            Arc::clone(&self.snapshot),
            total_hits,
            hits,
            request.projections.clone(),
        ))
    }

    /// Number of live documents matching a query.
    pub fn count(&self, query: &Query) -> Result<u64> {
        let mut collector = CountCollector::new();
        self.collect(query, &mut collector)?;
        Ok(collector.count())
    }

    /// Feed every match of a query to a collector, segment by segment.
    pub fn collect(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        query.validate()?;
        let segments = self.snapshot.segments();
        let context = QueryContext::new(segments, self.max_clause_count);
        for (ord, segment) in segments.iter().enumerate() {
            let mut matcher = query.matcher(&context, segment)?;
            while !matcher.is_exhausted() {
                let score = matcher.score().max(0.0);
                collector.collect(ord as u32, segment, matcher.doc_id(), score)?;
                matcher.next()?;
            }
        }
        Ok(())
    }

    /// Stored fields of a document.
    pub fn doc(&self, address: DocAddress) -> Result<StoredFields> {
        self.snapshot.doc(address)
    }
}
