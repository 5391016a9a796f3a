//! Range query implementation.

use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::analysis::token::Channel;
use crate::document::field_value::{FieldValue, ValueType};
use crate::error::{GlaiveError, Result};
use crate::query::matcher::{ConstantScoreMatcher, DisjunctionMatcher, EmptyMatcher, Matcher, TermMatcher};
use crate::query::query::{QueryContext, write_boost};
use crate::query::scorer::ConstantScorer;
use crate::query::term::one;
use crate::segment::reader::SegmentReader;

/// A query that matches documents with a term between two bounds.
///
/// Bounds are coerced to the value type the field was indexed with and
/// compared by canonical key, so dates and numbers compare by value.
/// Every match scores the boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    /// Field to search.
    pub field: String,
    /// Lower bound.
    pub lower: Bound<FieldValue>,
    /// Upper bound.
    pub upper: Bound<FieldValue>,
    /// Boost factor.
    #[serde(default = "one")]
    pub boost: f32,
}

impl RangeQuery {
    /// Create a range query.
    pub fn new<F: Into<String>>(field: F, lower: Bound<FieldValue>, upper: Bound<FieldValue>) -> Self {
        RangeQuery {
            field: field.into(),
            lower,
            upper,
            boost: 1.0,
        }
    }

    /// Range including both bounds.
    pub fn inclusive<F, L, U>(field: F, lower: L, upper: U) -> Self
    where
        F: Into<String>,
        L: Into<FieldValue>,
        U: Into<FieldValue>,
    {
        Self::new(field, Bound::Included(lower.into()), Bound::Included(upper.into()))
    }

    /// Set the boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    fn coerce(&self, bound: &Bound<FieldValue>, value_type: ValueType, lower: bool) -> Result<Bound<String>> {
        let invalid = |value: &FieldValue| {
            GlaiveError::query_syntax(format!(
                "{value} is not a valid {value_type} bound for field {}",
                self.field
            ))
        };
        let key = |value: &FieldValue| {
            value
                .coerce(value_type)
                .map(|value| value.canonical_key())
                .ok_or_else(|| invalid(value))
        };
        let value = match bound {
            Bound::Included(value) | Bound::Excluded(value) => value,
            Bound::Unbounded => return Ok(Bound::Unbounded),
        };
        // a fractional bound on an integer field rounds inwards and then
        // includes the rounded value
        if value_type == ValueType::Integer
            && let Some(fraction) = fractional(value)
        {
            let rounded = if lower { fraction.ceil() } else { fraction.floor() };
            if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
                return Err(invalid(value));
            }
            return Ok(Bound::Included(FieldValue::Integer(rounded as i64).canonical_key()));
        }
        Ok(match bound {
            Bound::Included(value) => Bound::Included(key(value)?),
            Bound::Excluded(value) => Bound::Excluded(key(value)?),
            Bound::Unbounded => Bound::Unbounded,
        })
    }

    pub(crate) fn matcher(
        &self,
        context: &QueryContext<'_>,
        segment: &SegmentReader,
    ) -> Result<Box<dyn Matcher>> {
        let Some(info) = segment.field_info(&self.field).filter(|info| info.indexed) else {
            return Ok(Box::new(EmptyMatcher::new()));
        };
        let lower = self.coerce(&self.lower, info.value_type, true)?;
        let upper = self.coerce(&self.upper, info.value_type, false)?;

        let mut clauses: Vec<Box<dyn Matcher>> = Vec::new();
        let terms = segment.dictionary().range(
            &self.field,
            Channel::Main,
            lower.as_ref().map(String::as_str),
            upper.as_ref().map(String::as_str),
        );
        for entry in terms {
            let (_, info) = entry?;
            if clauses.len() == context.max_clause_count() {
                return Err(GlaiveError::query_syntax(format!(
                    "{self} expands to more than {} terms",
                    context.max_clause_count()
                )));
            }
            clauses.push(Box::new(TermMatcher::new(
                segment.postings_for(info)?,
                segment,
                &self.field,
                Box::new(ConstantScorer::new(self.boost)),
            )?));
        }

        if clauses.is_empty() {
            return Ok(Box::new(EmptyMatcher::new()));
        }
        Ok(Box::new(ConstantScoreMatcher::new(
            Box::new(DisjunctionMatcher::new(clauses)),
            self.boost,
        )))
    }
}

/// The value as a finite float with a fractional part, if it is one.
fn fractional(value: &FieldValue) -> Option<f64> {
    let float = match value {
        FieldValue::Float(f) => Some(*f),
        FieldValue::Text(s) if s.trim().parse::<i64>().is_err() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    float.filter(|f| f.is_finite() && f.fract() != 0.0)
}

impl fmt::Display for RangeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.field)?;
        match &self.lower {
            Bound::Included(value) => write!(f, "[{value}")?,
            Bound::Excluded(value) => write!(f, "{{{value}")?,
            Bound::Unbounded => f.write_str("[*")?,
        }
        f.write_str(" TO ")?;
        match &self.upper {
            Bound::Included(value) => write!(f, "{value}]")?,
            Bound::Excluded(value) => write!(f, "{value}}}")?,
            Bound::Unbounded => f.write_str("*]")?,
        }
        write_boost(f, self.boost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::collect_doc_ids;
    use crate::query::query::{DEFAULT_MAX_CLAUSE_COUNT, testing};
    use crate::segment::DocId;
    use crate::storage::memory::MemoryStorage;

    fn matches(query: RangeQuery) -> Result<Vec<DocId>> {
        let storage = MemoryStorage::new();
        // ranks 0..=11; two-digit ranks sort before "2" as text
        let bodies = ["x"; 12];
        let segment = testing::segment(&storage, "segment_000001", &bodies);
        let segments = [segment.clone()];
        let context = QueryContext::new(&segments, DEFAULT_MAX_CLAUSE_COUNT);
        let mut matcher = query.matcher(&context, &segment)?;
        collect_doc_ids(matcher.as_mut())
    }

    #[test]
    fn test_integer_range_compares_numerically() {
        let query = RangeQuery::inclusive("rank", 2i64, 10i64);
        assert_eq!(matches(query).unwrap(), (2..=10).collect::<Vec<_>>());

        let open = RangeQuery::new("rank", Bound::Excluded(FieldValue::from("9")), Bound::Unbounded);
        assert_eq!(matches(open).unwrap(), vec![10, 11]);
    }

    #[test]
    fn test_negative_numbers_sort_first() {
        let query = RangeQuery::new("rank", Bound::Unbounded, Bound::Excluded(FieldValue::Integer(1)));
        assert_eq!(matches(query).unwrap(), vec![0]);
        let query = RangeQuery::inclusive("rank", -5i64, 0i64);
        assert_eq!(matches(query).unwrap(), vec![0]);
    }

    #[test]
    fn test_fractional_bounds_round_inwards() {
        let closed = RangeQuery::new(
            "rank",
            Bound::Included(FieldValue::Float(2.5)),
            Bound::Included(FieldValue::Integer(4)),
        );
        assert_eq!(matches(closed).unwrap(), vec![3, 4]);

        let open = RangeQuery::new(
            "rank",
            Bound::Excluded(FieldValue::Float(2.5)),
            Bound::Excluded(FieldValue::Integer(4)),
        );
        assert_eq!(matches(open).unwrap(), vec![3]);

        // truncation would turn -0.5 into 0 and match rank 0
        let negative = RangeQuery::inclusive("rank", -2.5f64, -0.5f64);
        assert!(matches(negative).unwrap().is_empty());

        let parsed = RangeQuery::inclusive("rank", "0.5", "2.5");
        assert_eq!(matches(parsed).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_text_range_and_bad_bounds() {
        let query = RangeQuery::inclusive("id", "10", "2");
        assert_eq!(matches(query).unwrap(), vec![2, 10, 11]);

        let err = matches(RangeQuery::inclusive("rank", "low", "high")).unwrap_err();
        assert!(matches!(err, GlaiveError::QuerySyntax(_)));
    }

    #[test]
    fn test_display() {
        let query = RangeQuery::new("rank", Bound::Included(FieldValue::Integer(1)), Bound::Unbounded);
        assert_eq!(query.to_string(), "rank:[1 TO *]");
    }
}
