//! Phrase query implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::matcher::{EmptyMatcher, Matcher, TermMatcher};
use crate::query::query::{QueryContext, write_boost};
use crate::query::scorer::{ConstantScorer, Scorer, TfIdfScorer};
use crate::query::term::one;
use crate::segment::reader::SegmentReader;
use crate::segment::term::TermKey;
use crate::segment::{DocId, TERMINATED};

/// One term of a phrase with its position relative to the phrase start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseTerm {
    /// Relative position.
    pub position: u32,
    /// Main channel term text.
    pub text: String,
}

/// A query that matches documents containing terms at given relative
/// positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    /// Field to search.
    pub field: String,
    /// Terms in phrase order.
    pub terms: Vec<PhraseTerm>,
    /// Boost factor.
    #[serde(default = "one")]
    pub boost: f32,
}

impl PhraseQuery {
    /// Phrase of consecutive words.
    pub fn new<F, I, S>(field: F, words: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = words
            .into_iter()
            .enumerate()
            .map(|(position, text)| PhraseTerm {
                position: position as u32,
                text: text.into(),
            })
            .collect();
        PhraseQuery {
            field: field.into(),
            terms,
            boost: 1.0,
        }
    }

    /// Phrase with explicit positions, e.g. leaving gaps for stop words.
    pub fn with_positions<F: Into<String>>(field: F, terms: Vec<(u32, String)>) -> Self {
        PhraseQuery {
            field: field.into(),
            terms: terms
                .into_iter()
                .map(|(position, text)| PhraseTerm { position, text })
                .collect(),
            boost: 1.0,
        }
    }

    /// Set the boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        let mut terms = Vec::with_capacity(self.terms.len());
        let mut idf = 0.0;
        for term in &self.terms {
            let key = TermKey::main(self.field.as_str(), term.text.as_str());
            let Some(postings) = segment.postings(&key)? else {
                return Ok(Box::new(EmptyMatcher::new()));
            };
            idf += context.idf(&key);
            // positions are all that matter for the individual terms
            let matcher = TermMatcher::new(postings, segment, &self.field, Box::new(ConstantScorer::new(0.0)))?;
            terms.push((matcher, term.position));
        }
        Ok(Box::new(PhraseMatcher::new(
            terms,
            segment,
            &self.field,
            TfIdfScorer::with_idf(idf, self.boost),
        )?))
    }
}

impl fmt::Display for PhraseQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<&str> = self.terms.iter().map(|t| t.text.as_str()).collect();
        write!(f, "{}:\"{}\"", self.field, words.join(" "))?;
        write_boost(f, self.boost)
    }
}

/// Matches documents where every term occurs at its relative position.
#[derive(Debug)]
pub struct PhraseMatcher {
    /// Term matchers with their phrase offsets, cheapest first.
    terms: Vec<(TermMatcher, u32)>,
    segment: SegmentReader,
    field: String,
    scorer: TfIdfScorer,
    current: DocId,
    phrase_freq: u32,
}

impl PhraseMatcher {
    fn new(
        mut terms: Vec<(TermMatcher, u32)>,
        segment: &SegmentReader,
        field: &str,
        scorer: TfIdfScorer,
    ) -> Result<Self> {
        terms.sort_by_key(|(matcher, _)| matcher.cost());
        let mut matcher = PhraseMatcher {
            terms,
            segment: segment.clone(),
            field: field.to_string(),
            scorer,
            current: TERMINATED,
            phrase_freq: 0,
        };
        if let Some((lead, _)) = matcher.terms.first() {
            let target = lead.doc_id();
            if target != TERMINATED {
                matcher.advance_to_match(target)?;
            }
        }
        Ok(matcher)
    }

    /// Position every term on the first common doc `>= target`.
    fn align(&mut self, mut target: DocId) -> Result<bool> {
        'candidates: loop {
            for (matcher, _) in self.terms.iter_mut() {
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

    fn advance_to_match(&mut self, mut target: DocId) -> Result<bool> {
        loop {
            if !self.align(target)? {
                self.phrase_freq = 0;
                return Ok(false);
            }
            let freq = self.count_phrases()?;
            if freq > 0 {
                self.phrase_freq = freq;
                return Ok(true);
            }
            target = self.current + 1;
        }
    }

    /// Number of phrase occurrences in the current document.
    fn count_phrases(&self) -> Result<u32> {
        let mut starts: Vec<Vec<u32>> = Vec::with_capacity(self.terms.len());
        for (matcher, offset) in &self.terms {
            let positions = matcher.positions()?;
            starts.push(
                positions
                    .into_iter()
                    .filter_map(|position| position.checked_sub(*offset))
                    .collect(),
            );
        }
        let Some((first, rest)) = starts.split_first() else {
            return Ok(0);
        };
        let count = first
            .iter()
            .filter(|start| rest.iter().all(|other| other.binary_search(start).is_ok()))
            .count();
        Ok(count as u32)
    }

    /// Occurrences of the phrase in the current document.
    pub fn phrase_freq(&self) -> u32 {
        self.phrase_freq
    }
}

impl Matcher for PhraseMatcher {
    fn doc_id(&self) -> DocId {
        self.current
    }

    fn next(&mut self) -> Result<bool> {
        if self.current == TERMINATED {
            return Ok(false);
        }
        self.advance_to_match(self.current + 1)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.current == TERMINATED || target <= self.current {
            return Ok(!self.is_exhausted());
        }
        self.advance_to_match(target)
    }

    fn cost(&self) -> u64 {
        self.terms.first().map_or(0, |(matcher, _)| matcher.cost())
    }

    fn score(&self) -> f32 {
        self.scorer.score(
            self.phrase_freq,
            self.segment.field_length(self.current, &self.field),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::query::query::{DEFAULT_MAX_CLAUSE_COUNT, testing};
    use crate::storage::memory::MemoryStorage;

    fn matches(bodies: &[&str], query: PhraseQuery) -> Vec<DocId> {
        let storage = MemoryStorage::new();
        let segment = testing::segment(&storage, "segment_000001", bodies);
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut matcher = query.matcher(&context, &segment).unwrap();
        collect_doc_ids(matcher.as_mut()).unwrap()
    }

    #[test]
    fn test_phrase_requires_adjacency() {
        let bodies = ["quick brown fox", "brown quick fox", "quick fox brown", "fox"];
        assert_eq!(matches(&bodies, PhraseQuery::new("body", ["quick", "brown"])), vec![0]);
        assert_eq!(matches(&bodies, PhraseQuery::new("body", ["quick", "fox"])), vec![1, 2]);
        assert!(matches(&bodies, PhraseQuery::new("body", ["fox", "zebra"])).is_empty());
    }

    #[test]
    fn test_phrase_with_gap() {
        // "the" is a stop word and leaves a hole at position 1
        let bodies = ["jump the fence", "jump fence"];
        let query = PhraseQuery::with_positions(
            "body",
            vec![(0, "jump".to_string()), (2, "fenc".to_string())],
        );
        assert_eq!(matches(&bodies, query), vec![0]);
    }

    #[test]
    fn test_phrase_frequency_scores_higher() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(
            &storage,
            "segment_000001",
            &["red fox and red fox", "red fox and a blue cat"],
        );
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut matcher = PhraseQuery::new("body", ["red", "fox"])
            .matcher(&context, &segment)
            .unwrap();
        let first = matcher.score();
        assert!(matcher.next().unwrap());
        assert!(first > matcher.score());
    }
}
