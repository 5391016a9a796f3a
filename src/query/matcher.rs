//! Matcher implementations for query execution.
//!
//! A matcher walks the documents of one segment that satisfy a query, in
//! ascending doc id order. It is positioned on its first match when created;
//! [`Matcher::doc_id`] returns [`TERMINATED`] once it is exhausted. Leaf
//! matchers never surface deleted documents, so composite matchers do not
//! need to check deletions again.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;
use crate::query::scorer::Scorer;
use crate::segment::deletions::DeletionBitmap;
use crate::segment::postings::PostingsIterator;
use crate::segment::reader::SegmentReader;
use crate::segment::{DocId, TERMINATED};

/// Trait for document matchers.
pub trait Matcher: Send + Debug {
    /// Get the current document ID.
    fn doc_id(&self) -> DocId;

    /// Move to the next matching document.
    fn next(&mut self) -> Result<bool>;

    /// Skip to the first match `>= target`. A matcher already at or past
    /// `target` stays where it is.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    /// Get the cost of iterating through this matcher.
    fn cost(&self) -> u64;

    /// Check if this matcher is exhausted.
    fn is_exhausted(&self) -> bool {
        self.doc_id() == TERMINATED
    }

    /// Score of the current document.
    fn score(&self) -> f32;
}

/// A matcher that matches no documents.
#[derive(Debug, Default)]
pub struct EmptyMatcher;

impl EmptyMatcher {
    /// Create a new empty matcher.
    pub fn new() -> Self {
        EmptyMatcher
    }
}

impl Matcher for EmptyMatcher {
    fn doc_id(&self) -> DocId {
        TERMINATED
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn skip_to(&mut self, _target: DocId) -> Result<bool> {
        Ok(false)
    }

    fn cost(&self) -> u64 {
        0
    }

    fn score(&self) -> f32 {
        0.0
    }
}

/// A matcher that matches all live documents with a constant score.
#[derive(Debug)]
pub struct AllMatcher {
    current: DocId,
    max_doc: DocId,
    deletions: Option<Arc<DeletionBitmap>>,
    score: f32,
}

impl AllMatcher {
    /// Create a matcher over every live document of `segment`.
    pub fn new(segment: &SegmentReader, score: f32) -> Self {
        let mut matcher = AllMatcher {
            current: 0,
            max_doc: segment.max_doc(),
            deletions: segment.deletions().cloned(),
            score,
        };
        matcher.settle(0);
        matcher
    }

    fn settle(&mut self, mut doc: DocId) {
        while doc < self.max_doc
            && self
                .deletions
                .as_ref()
                .is_some_and(|deletions| deletions.is_deleted(doc))
        {
            doc += 1;
        }
        self.current = if doc < self.max_doc { doc } else { TERMINATED };
    }
}

impl Matcher for AllMatcher {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> Result<bool> {
        if self.current != TERMINATED {
            self.settle(self.current + 1);
        }
        Ok(!self.is_exhausted())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.current != TERMINATED && target > self.current {
            self.settle(target);
        }
        Ok(!self.is_exhausted())
    }

    fn cost(&self) -> u64 {
        self.max_doc as u64
    }

    fn score(&self) -> f32 {
        self.score
    }
}

/// Matches the documents of one posting list.
#[derive(Debug)]
pub struct TermMatcher {
    postings: PostingsIterator,
    segment: SegmentReader,
    field: String,
    scorer: Box<dyn Scorer>,
}

impl TermMatcher {
    /// Create a matcher over `postings`, a list of `field` in `segment`.
    pub fn new(
        postings: PostingsIterator,
        segment: &SegmentReader,
        field: &str,
        scorer: Box<dyn Scorer>,
    ) -> Result<Self> {
        let mut matcher = TermMatcher {
            postings,
            segment: segment.clone(),
            field: field.to_string(),
            scorer,
        };
        matcher.skip_deleted()?;
        Ok(matcher)
    }

    fn skip_deleted(&mut self) -> Result<bool> {
        while !self.postings.is_exhausted() && self.segment.is_deleted(self.postings.doc_id()) {
            self.postings.next()?;
        }
        Ok(!self.postings.is_exhausted())
    }

    /// Frequency of the term in the current document.
    pub fn term_freq(&self) -> u32 {
        self.postings.term_freq()
    }

    /// Positions of the term in the current document.
    pub fn positions(&self) -> Result<Vec<u32>> {
        self.postings.positions()
    }
}

impl Matcher for TermMatcher {
    fn doc_id(&self) -> DocId {
        self.postings.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        if !self.postings.next()? {
            return Ok(false);
        }
        self.skip_deleted()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.postings.skip_to(target)? {
            return Ok(false);
        }
        self.skip_deleted()
    }

    fn cost(&self) -> u64 {
        self.postings.doc_freq() as u64
    }

    fn score(&self) -> f32 {
        let doc = self.postings.doc_id();
        self.scorer.score(
            self.postings.term_freq(),
            self.segment.field_length(doc, &self.field),
        )
    }
}

/// Intersection of matchers, leapfrogging from the cheapest clause.
#[derive(Debug)]
pub struct ConjunctionMatcher {
    /// Clauses ordered by ascending cost.
    matchers: Vec<Box<dyn Matcher>>,
    current: DocId,
}

impl ConjunctionMatcher {
    /// Create a conjunction; an empty clause list matches nothing.
    pub fn new(mut matchers: Vec<Box<dyn Matcher>>) -> Result<Self> {
        matchers.sort_by_key(|matcher| matcher.cost());
        let mut conjunction = ConjunctionMatcher {
            matchers,
            current: TERMINATED,
        };
        if let Some(lead) = conjunction.matchers.first()
            && !conjunction.matchers.iter().any(|m| m.is_exhausted())
        {
            let target = lead.doc_id();
            conjunction.align(target)?;
        }
        Ok(conjunction)
    }

    fn align(&mut self, mut target: DocId) -> Result<bool> {
        'candidates: loop {
            for matcher in self.matchers.iter_mut() {
                if !matcher.skip_to(target)? {
                    self.current = TERMINATED;
                    return Ok(false);
                }
                if matcher.doc_id() > target {
                    target = matcher.doc_id();
                    continue 'candidates;
                }
            }
            self.current = target;
            return Ok(true);
        }
    }
}

impl Matcher for ConjunctionMatcher {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> Result<bool> {
        if self.current == TERMINATED {
            return Ok(false);
        }
        let Some(lead) = self.matchers.first_mut() else {
            self.current = TERMINATED;
            return Ok(false);
        };
        if !lead.next()? {
            self.current = TERMINATED;
            return Ok(false);
        }
        let target = lead.doc_id();
        self.align(target)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.current == TERMINATED || target <= self.current {
            return Ok(!self.is_exhausted());
        }
        self.align(target)
    }

    fn cost(&self) -> u64 {
        self.matchers.first().map_or(0, |m| m.cost())
    }

    fn score(&self) -> f32 {
        self.matchers.iter().map(|m| m.score()).sum()
    }
}

/// A helper struct for tracking matchers in the disjunction heap.
#[derive(Debug)]
struct MatcherEntry {
    matcher: Box<dyn Matcher>,
}

impl PartialEq for MatcherEntry {
    fn eq(&self, other: &Self) -> bool {
        self.matcher.doc_id() == other.matcher.doc_id()
    }
}

impl Eq for MatcherEntry {}

impl PartialOrd for MatcherEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatcherEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: lower doc IDs come first
        other.matcher.doc_id().cmp(&self.matcher.doc_id())
    }
}

/// Union of matchers; the score sums every clause on the current document.
#[derive(Debug)]
pub struct DisjunctionMatcher {
    /// Min-heap of active matchers, ordered by current doc_id.
    heap: BinaryHeap<MatcherEntry>,
    current: DocId,
    cost: u64,
}

impl DisjunctionMatcher {
    /// Create a new disjunction matcher from multiple matchers.
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        let mut heap = BinaryHeap::new();
        let mut cost = 0;
        for matcher in matchers {
            if !matcher.is_exhausted() {
                cost += matcher.cost();
                heap.push(MatcherEntry { matcher });
            }
        }
        let current = heap
            .peek()
            .map_or(TERMINATED, |entry| entry.matcher.doc_id());
        DisjunctionMatcher {
            heap,
            current,
            cost,
        }
    }

    /// Number of clauses that are not exhausted.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether every clause is exhausted.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Advance every clause positioned before `target`.
    fn advance_below(&mut self, target: DocId) -> Result<()> {
        while self
            .heap
            .peek()
            .is_some_and(|entry| entry.matcher.doc_id() < target)
        {
            let Some(mut entry) = self.heap.pop() else {
                break;
            };
            if entry.matcher.skip_to(target)? {
                self.heap.push(entry);
            }
        }
        self.current = self
            .heap
            .peek()
            .map_or(TERMINATED, |entry| entry.matcher.doc_id());
        Ok(())
    }
}

impl Matcher for DisjunctionMatcher {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> Result<bool> {
        if self.current == TERMINATED {
            return Ok(false);
        }
        self.advance_below(self.current + 1)?;
        Ok(!self.is_exhausted())
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.current != TERMINATED && target > self.current {
            self.advance_below(target)?;
        }
        Ok(!self.is_exhausted())
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn score(&self) -> f32 {
        self.heap
            .iter()
            .filter(|entry| entry.matcher.doc_id() == self.current)
            .map(|entry| entry.matcher.score())
            .sum()
    }
}

/// Documents of `include` that `exclude` does not match.
#[derive(Debug)]
pub struct ExclusionMatcher {
    include: Box<dyn Matcher>,
    exclude: Box<dyn Matcher>,
}

impl ExclusionMatcher {
    /// Create an exclusion matcher.
    pub fn new(include: Box<dyn Matcher>, exclude: Box<dyn Matcher>) -> Result<Self> {
        let mut matcher = ExclusionMatcher { include, exclude };
        matcher.settle()?;
        Ok(matcher)
    }

    fn settle(&mut self) -> Result<bool> {
        loop {
            if self.include.is_exhausted() {
                return Ok(false);
            }
            let doc = self.include.doc_id();
            if self.exclude.doc_id() < doc {
                self.exclude.skip_to(doc)?;
            }
            if self.exclude.doc_id() != doc {
                return Ok(true);
            }
            self.include.next()?;
        }
    }
}

impl Matcher for ExclusionMatcher {
    fn doc_id(&self) -> DocId {
        self.include.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        if !self.include.next()? {
            return Ok(false);
        }
        self.settle()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.include.skip_to(target)? {
            return Ok(false);
        }
        self.settle()
    }

    fn cost(&self) -> u64 {
        self.include.cost()
    }

    fn score(&self) -> f32 {
        self.include.score()
    }
}

/// Documents of `required`; `optional` only adds to their score.
#[derive(Debug)]
pub struct RequiredOptionalMatcher {
    required: Box<dyn Matcher>,
    optional: Box<dyn Matcher>,
    optional_matches: bool,
}

impl RequiredOptionalMatcher {
    /// Create the matcher.
    pub fn new(required: Box<dyn Matcher>, optional: Box<dyn Matcher>) -> Result<Self> {
        let mut matcher = RequiredOptionalMatcher {
            required,
            optional,
            optional_matches: false,
        };
        matcher.align_optional()?;
        Ok(matcher)
    }

    fn align_optional(&mut self) -> Result<bool> {
        let doc = self.required.doc_id();
        if doc == TERMINATED {
            self.optional_matches = false;
            return Ok(false);
        }
        if self.optional.doc_id() < doc {
            self.optional.skip_to(doc)?;
        }
        self.optional_matches = self.optional.doc_id() == doc;
        Ok(true)
    }
}

impl Matcher for RequiredOptionalMatcher {
    fn doc_id(&self) -> DocId {
        self.required.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.required.next()?;
        self.align_optional()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.required.skip_to(target)?;
        self.align_optional()
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }

    fn score(&self) -> f32 {
        let optional = if self.optional_matches {
            self.optional.score()
        } else {
            0.0
        };
        self.required.score() + optional
    }
}

/// Wraps a matcher and replaces its score with a constant.
#[derive(Debug)]
pub struct ConstantScoreMatcher {
    inner: Box<dyn Matcher>,
    score: f32,
}

impl ConstantScoreMatcher {
    /// Create the matcher.
    pub fn new(inner: Box<dyn Matcher>, score: f32) -> Self {
        ConstantScoreMatcher { inner, score }
    }
}

impl Matcher for ConstantScoreMatcher {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.inner.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.inner.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }

    fn score(&self) -> f32 {
        self.score
    }
}

/// Multiplies the score of a matcher.
#[derive(Debug)]
pub struct BoostMatcher {
    inner: Box<dyn Matcher>,
    boost: f32,
}

impl BoostMatcher {
    /// Wrap `inner`; a boost of 1 returns it unchanged.
    pub fn wrap(inner: Box<dyn Matcher>, boost: f32) -> Box<dyn Matcher> {
        if boost == 1.0 {
            inner
        } else {
            Box::new(BoostMatcher { inner, boost })
        }
    }
}

impl Matcher for BoostMatcher {
    fn doc_id(&self) -> DocId {
        self.inner.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.inner.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.inner.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }

    fn score(&self) -> f32 {
        self.inner.score() * self.boost
    }
}

/// Drain a matcher into its remaining doc ids.
pub fn collect_doc_ids(matcher: &mut dyn Matcher) -> Result<Vec<DocId>> {
    let mut docs = Vec::new();
    while !matcher.is_exhausted() {
        docs.push(matcher.doc_id());
        matcher.next()?;
    }
    Ok(docs)
}
