//! Grouping of search results by field value or by calendar day.

use std::hash::Hash;

use ahash::AHashMap;
use chrono::NaiveDate;

use crate::document::field_value::{FieldValue, ValueType};
use crate::error::Result;
use crate::search::result::SearchResult;
use crate::search::results::SearchResults;
use crate::segment::stored::StoredFields;

/// Results sharing one value of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    /// The shared value, `None` for documents without one.
    pub key: Option<FieldValue>,
    /// Members in result order.
    pub results: Vec<SearchResult>,
}

/// Results whose date falls on one UTC day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    /// The day, `None` for documents without a date.
    pub day: Option<NaiveDate>,
    /// Members in result order.
    pub results: Vec<SearchResult>,
}

impl SearchResults {
    /// Consume the results into groups keyed by a stored field.
    ///
    /// Groups appear in the order of their first member, so a relevance
    /// ranking or a sort on the same field carries over to the groups.
    pub fn grouped_by_field(self, field: &str) -> Result<Vec<FieldGroup>> {
        let groups = self.group(|stored| {
            let value = stored.get(field).cloned();
            let key = value.as_ref().map(|v| (v.value_type(), v.canonical_key()));
            (key, value)
        })?;
        Ok(groups
            .into_iter()
            .map(|(key, results)| FieldGroup { key, results })
            .collect())
    }

    /// Consume the results into groups by the UTC day of a date field.
    pub fn grouped_by_day(self, field: &str) -> Result<Vec<DayGroup>> {
        let groups = self.group(|stored| {
            let day = stored
                .get(field)
                .and_then(|value| value.coerce(ValueType::Date))
                .and_then(|value| value.as_date())
                .map(|date| date.date_naive());
            (day, day)
        })?;
        Ok(groups
            .into_iter()
            .map(|(day, results)| DayGroup { day, results })
            .collect())
    }

    /// Group hits by the hashable first half of `key_of`, labelling each
    /// group with the second half of its first member.
    fn group<H, K, F>(self, key_of: F) -> Result<Vec<(K, Vec<SearchResult>)>>
    where
        H: Hash + Eq,
        F: Fn(&StoredFields) -> (H, K),
    {
        let mut index: AHashMap<H, usize> = AHashMap::new();
        let mut groups: Vec<(K, Vec<SearchResult>)> = Vec::new();
        for hit in self.hits() {
            let stored = self.snapshot().doc(hit.address)?;
            let (hash_key, key) = key_of(&stored);
            let result = SearchResult::from_stored(hit.address, hit.score, stored, self.projections());
            match index.get(&hash_key) {
                Some(&i) => groups[i].1.push(result),
                None => {
                    index.insert(hash_key, groups.len());
                    groups.push((key, vec![result]));
                }
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::IndexConfig;
    use crate::document::Document;
    use crate::document::field_value::FieldValue;
    use crate::index::Index;
    use crate::query::{Query, SortDescriptor};

    #[test]
    fn test_groups_keep_first_seen_order() {
        let index = Index::open_in_memory(IndexConfig::default()).unwrap();
        let mut writer = index.writer().unwrap();
        for (id, color, rank) in [("1", "red", 4), ("2", "blue", 3), ("3", "red", 2), ("4", "", 1)] {
            let mut builder = Document::builder().add_keyword("id", id).add_integer("rank", rank);
            if !color.is_empty() {
                builder = builder.add_keyword("color", color);
            }
            writer.add_document(builder.build()).unwrap();
        }
        writer.commit().unwrap();

        let results = index
            .searcher()
            .search(
                &Query::all(),
                Some(&SortDescriptor::parse("rank:integer:desc").unwrap()),
                10,
            )
            .unwrap();
        let groups = results.grouped_by_field("color").unwrap();
        let summary: Vec<(Option<FieldValue>, usize)> =
            groups.iter().map(|g| (g.key.clone(), g.results.len())).collect();
        assert_eq!(
            summary,
            vec![
                (Some(FieldValue::from("red")), 2),
                (Some(FieldValue::from("blue")), 1),
                (None, 1),
            ]
        );
    }
}
