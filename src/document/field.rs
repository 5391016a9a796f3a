//! Document fields and their indexing policies.

use serde::{Deserialize, Serialize};

use crate::document::field_value::FieldValue;

/// How a field takes part in the inverted index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Run through the field's analyzer; every produced token is a term.
    Analyzed,
    /// Indexed as a single term (the canonical key of the value).
    NotAnalyzed,
    /// Not searchable, only kept in stored fields.
    StoredOnly,
}

impl IndexPolicy {
    /// Whether fields with this policy produce postings.
    pub fn is_indexed(self) -> bool {
        !matches!(self, IndexPolicy::StoredOnly)
    }
}

/// A named value with its indexing policy.
///
/// # Examples
///
/// ```
/// use glaive::document::field::{Field, IndexPolicy};
/// use glaive::document::field_value::FieldValue;
///
/// let field = Field::new("title", FieldValue::from("Hello"), IndexPolicy::Analyzed);
/// assert!(field.stored);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,

    /// The field value.
    pub value: FieldValue,

    /// How the field is indexed.
    pub policy: IndexPolicy,

    /// Whether the value is kept in the stored fields of the segment.
    pub stored: bool,
}

impl Field {
    /// Create a stored field.
    pub fn new<S: Into<String>>(name: S, value: FieldValue, policy: IndexPolicy) -> Self {
        Field {
            name: name.into(),
            value,
            policy,
            stored: true,
        }
    }

    /// Set whether the value is stored.
    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    /// Whether the field produces postings.
    pub fn is_indexed(&self) -> bool {
        self.policy.is_indexed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_only_is_not_indexed() {
        let field = Field::new("blob", FieldValue::from("x"), IndexPolicy::StoredOnly);
        assert!(!field.is_indexed());
        assert!(field.stored);

        let field = Field::new("id", FieldValue::from("x"), IndexPolicy::NotAnalyzed).stored(false);
        assert!(field.is_indexed());
        assert!(!field.stored);
    }
}
