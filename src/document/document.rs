//! Document structure.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::document::field::{Field, IndexPolicy};
use crate::document::field_value::FieldValue;

/// A document represents a single item to be indexed.
///
/// Fields keep their insertion order and a name may occur more than once;
/// every occurrence is indexed, positions continue across occurrences.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    /// Create a builder for constructing documents.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    /// Append a field.
    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Get the first field with this name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the first value of a field.
    pub fn get_value(&self, name: &str) -> Option<&FieldValue> {
        self.get_field(name).map(|f| &f.value)
    }

    /// Iterate over all values of a field.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| &f.value)
    }

    /// Check if the document has a field.
    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Field> for Document {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Document {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Builder for [`Document`].
///
/// ```
/// use glaive::document::document::Document;
///
/// let doc = Document::builder()
///     .add_keyword("id", "doc-1")
///     .add_text("body", "The quick fox")
///     .add_integer("year", 2024)
///     .build();
///
/// assert_eq!(doc.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new document builder.
    pub fn new() -> Self {
        DocumentBuilder {
            document: Document::new(),
        }
    }

    /// Add an analyzed, stored text field.
    pub fn add_text<S: Into<String>, T: Into<String>>(mut self, name: S, text: T) -> Self {
        self.document.add_field(Field::new(
            name,
            FieldValue::Text(text.into()),
            IndexPolicy::Analyzed,
        ));
        self
    }

    /// Add a text field indexed verbatim as a single term.
    pub fn add_keyword<S: Into<String>, T: Into<String>>(mut self, name: S, text: T) -> Self {
        self.document.add_field(Field::new(
            name,
            FieldValue::Text(text.into()),
            IndexPolicy::NotAnalyzed,
        ));
        self
    }

    /// Add a date field, indexed by its canonical UTC key.
    pub fn add_date<S: Into<String>, Tz: TimeZone>(mut self, name: S, date: DateTime<Tz>) -> Self {
        self.document.add_field(Field::new(
            name,
            FieldValue::from(date),
            IndexPolicy::NotAnalyzed,
        ));
        self
    }

    /// Add an integer field.
    pub fn add_integer<S: Into<String>>(mut self, name: S, value: i64) -> Self {
        self.document.add_field(Field::new(
            name,
            FieldValue::Integer(value),
            IndexPolicy::NotAnalyzed,
        ));
        self
    }

    /// Add a float field.
    pub fn add_float<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.document.add_field(Field::new(
            name,
            FieldValue::Float(value),
            IndexPolicy::NotAnalyzed,
        ));
        self
    }

    /// Add a value that is stored but not searchable.
    pub fn add_stored<S: Into<String>, V: Into<FieldValue>>(mut self, name: S, value: V) -> Self {
        self.document
            .add_field(Field::new(name, value.into(), IndexPolicy::StoredOnly));
        self
    }

    /// Add an arbitrary field.
    pub fn add_field(mut self, field: Field) -> Self {
        self.document.add_field(field);
        self
    }

    /// Finish the document.
    pub fn build(self) -> Document {
        self.document
    }
}
