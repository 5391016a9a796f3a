//! A single search hit with its loaded fields.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::document::field_value::{FieldValue, ValueType};
use crate::segment::DocAddress;
use crate::segment::stored::StoredFields;

/// A stored field to load for every hit, coerced to a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// Stored field name.
    pub field: String,
    /// Type the value is coerced to.
    pub value_type: ValueType,
}

impl Projection {
    /// Create a projection.
    pub fn new<F: Into<String>>(field: F, value_type: ValueType) -> Self {
        Projection {
            field: field.into(),
            value_type,
        }
    }
}

/// One hit of a search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Where the document lives in the searched snapshot.
    pub address: DocAddress,
    /// Relevance score, never negative.
    pub score: f32,
    /// Loaded field values in projection (or storage) order.
    pub fields: Vec<(String, FieldValue)>,
}

impl SearchResult {
    /// Build a result from the stored fields of its document.
    ///
    /// Without projections every stored value is kept as is. Otherwise only
    /// the first value of each projected field is kept, coerced to the
    /// declared type; values that do not coerce are left out.
    pub(crate) fn from_stored(
        address: DocAddress,
        score: f32,
        stored: StoredFields,
        projections: &[Projection],
    ) -> Self {
        let fields = if projections.is_empty() {
            stored
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect()
        } else {
            projections
                .iter()
                .filter_map(|projection| {
                    let value = stored.get(&projection.field)?;
                    match value.coerce(projection.value_type) {
                        Some(value) => Some((projection.field.clone(), value)),
                        None => {
                            debug!(
                                "Field {} of {:?} is not a valid {}",
                                projection.field, address, projection.value_type
                            );
                            None
                        }
                    }
                })
                .collect()
        };
        SearchResult {
            address,
            score,
            fields,
        }
    }

    /// First loaded value of a field.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// A field as text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// A field as a date.
    pub fn date(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get(field)?.coerce(ValueType::Date)?.as_date()
    }

    /// A field as an integer.
    pub fn integer(&self, field: &str) -> Option<i64> {
        self.get(field)?.coerce(ValueType::Integer)?.as_integer()
    }

    /// A field as a float.
    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field)?.coerce(ValueType::Float)?.as_float()
    }
}
