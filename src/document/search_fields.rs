//! Well-known field names and the [`Indexable`] adapter for host objects.

use crate::document::document::Document;
use crate::document::field::{Field, IndexPolicy};
use crate::document::field_value::FieldValue;

/// Field names shared by every indexed object.
pub struct SearchFields;

impl SearchFields {
    /// Unique identifier of the object within its type.
    pub const IDENTIFIER: &'static str = "id";
    /// Single-character object type.
    pub const OBJECT_TYPE: &'static str = "obj";
    /// Title text.
    pub const TITLE: &'static str = "t";
    /// Main body text.
    pub const VALUE: &'static str = "v";
    /// Modification timestamp.
    pub const TIMESTAMP: &'static str = "s";

    /// Fields searched by plain text queries.
    pub fn default_search_fields() -> [&'static str; 2] {
        [Self::TITLE, Self::VALUE]
    }
}

/// An object that knows how to describe itself as a document.
pub trait Indexable {
    /// Identifier, unique among objects of the same type.
    fn index_identifier(&self) -> String;

    /// Object type tag.
    fn index_type(&self) -> char;

    /// Field values to index, keyed by field name.
    fn index_fields(&self) -> Vec<(String, FieldValue)>;

    /// Build the document for this object.
    ///
    /// Identifier and type are indexed verbatim. Text fields are analyzed,
    /// except for identifier-like fields; other values are indexed by
    /// their canonical key. Everything is stored.
    fn to_document(&self) -> Document {
        let mut doc = Document::builder()
            .add_keyword(SearchFields::IDENTIFIER, self.index_identifier())
            .add_keyword(SearchFields::OBJECT_TYPE, self.index_type().to_string())
            .build();

        for (name, value) in self.index_fields() {
            if name == SearchFields::IDENTIFIER || name == SearchFields::OBJECT_TYPE {
                continue;
            }
            let policy = match value {
                FieldValue::Text(_) => IndexPolicy::Analyzed,
                _ => IndexPolicy::NotAnalyzed,
            };
            doc.add_field(Field::new(name, value, policy));
        }
        doc
    }
}

/// A plain [`Indexable`] built from an identifier, a type and field values.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleIndexable {
    identifier: String,
    object_type: char,
    fields: Vec<(String, FieldValue)>,
}

impl SimpleIndexable {
    /// Create an indexable object.
    pub fn new<S: Into<String>>(identifier: S, object_type: char) -> Self {
        SimpleIndexable {
            identifier: identifier.into(),
            object_type,
            fields: Vec::new(),
        }
    }

    /// Add a field value.
    pub fn with_field<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

impl Indexable for SimpleIndexable {
    fn index_identifier(&self) -> String {
        self.identifier.clone()
    }

    fn index_type(&self) -> char {
        self.object_type
    }

    fn index_fields(&self) -> Vec<(String, FieldValue)> {
        self.fields.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_document() {
        let object = SimpleIndexable::new("42", 'c')
            .with_field(SearchFields::TITLE, "Hello")
            .with_field(SearchFields::VALUE, "Hello from the sample")
            .with_field("year", 2024i64)
            .with_field(SearchFields::IDENTIFIER, "ignored");

        let doc = object.to_document();

        assert_eq!(
            doc.get_value(SearchFields::IDENTIFIER),
            Some(&FieldValue::from("42"))
        );
        assert_eq!(
            doc.get_value(SearchFields::OBJECT_TYPE),
            Some(&FieldValue::from("c"))
        );
        assert_eq!(doc.get_field(SearchFields::TITLE).unwrap().policy, IndexPolicy::Analyzed);
        assert_eq!(doc.get_field("year").unwrap().policy, IndexPolicy::NotAnalyzed);
        assert_eq!(doc.get_all(SearchFields::IDENTIFIER).count(), 1);
    }
}
