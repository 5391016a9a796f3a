//! Term query implementation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::token::Channel;
use crate::error::Result;
use crate::query::matcher::{EmptyMatcher, Matcher, TermMatcher};
use crate::query::query::{QueryContext, write_boost};
use crate::segment::reader::SegmentReader;
use crate::segment::term::TermKey;

/// A query that matches documents containing one exact term.
///
/// The text is looked up as is; use the query parser to run words through
/// the field's analyzer first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    /// Field to search.
    pub field: String,
    /// Term text.
    pub text: String,
    /// Channel the term lives on.
    #[serde(default = "main_channel")]
    pub channel: Channel,
    /// Boost factor.
    #[serde(default = "one")]
    pub boost: f32,
}

fn main_channel() -> Channel {
    Channel::Main
}

pub(crate) fn one() -> f32 {
    1.0
}

impl TermQuery {
    /// Create a query for a main channel term.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        TermQuery {
            field: field.into(),
            text: text.into(),
            channel: Channel::Main,
            boost: 1.0,
        }
    }

    /// Create a query for an unstemmed surface term.
    pub fn surface<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        TermQuery {
            channel: Channel::Surface,
            ..Self::new(field, text)
        }
    }

    /// Set the boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// The searched term.
    pub fn term(&self) -> TermKey {
        TermKey::new(self.field.as_str(), self.channel, self.text.as_str())
    }

    pub(crate) fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        let term = self.term();
        match segment.postings(&term)? {
            Some(postings) => {
                let scorer = context.term_scorer(&term, self.boost);
                Ok(Box::new(TermMatcher::new(
                    postings,
                    segment,
                    &self.field,
                    Box::new(scorer),
                )?))
            }
            None => Ok(Box::new(EmptyMatcher::new())),
        }
    }
}

impl fmt::Display for TermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term())?;
        write_boost(f, self.boost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::query::query::{DEFAULT_MAX_CLAUSE_COUNT, testing};
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_term_matches_stemmed_form() {
        let storage = MemoryStorage::new();
        let segment = testing::segment(
            &storage,
            "segment_000001",
            &["The quick fox", "A quick cat", "Running dogs"],
        );
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);

        let mut quick = TermQuery::new("body", "quick").matcher(&context, &segment).unwrap();
        assert!(quick.score() > 0.0);
        assert_eq!(collect_doc_ids(quick.as_mut()).unwrap(), vec![0, 1]);

        let mut run = TermQuery::new("body", "run").matcher(&context, &segment).unwrap();
        assert_eq!(collect_doc_ids(run.as_mut()).unwrap(), vec![2]);

        let mut surface = TermQuery::surface("body", "running")
            .matcher(&context, &segment)
            .unwrap();
        assert_eq!(collect_doc_ids(surface.as_mut()).unwrap(), vec![2]);

        let missing = TermQuery::new("body", "zebra").matcher(&context, &segment).unwrap();
        assert!(missing.is_exhausted());
    }

    #[test]
    fn test_display() {
        assert_eq!(TermQuery::new("body", "fox").to_string(), "body:fox");
        assert_eq!(
            TermQuery::surface("body", "foxes").with_boost(1.5).to_string(),
            "body:~foxes^1.5"
        );
    }
}
