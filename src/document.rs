//! Documents handed to the index writer.
//!
//! A [`Document`] is an ordered list of [`Field`]s; each field carries a
//! [`FieldValue`] and an [`IndexPolicy`] deciding whether it is analyzed,
//! indexed verbatim or only stored.
//!
//! ```
//! use glaive::document::Document;
//!
//! let doc = Document::builder()
//!     .add_text("title", "Rust Programming Guide")
//!     .add_keyword("isbn", "978-1")
//!     .add_integer("year", 2024)
//!     .add_float("price", 39.99)
//!     .build();
//!
//! assert_eq!(doc.len(), 4);
//! assert!(doc.has_field("title"));
//! ```

#[allow(clippy::module_inception)]
pub mod document;
pub mod field;
pub mod field_value;
pub mod search_fields;

pub use document::{Document, DocumentBuilder};
pub use field::{Field, IndexPolicy};
pub use field_value::{FieldValue, ValueType, parse_date};
pub use search_fields::{Indexable, SearchFields, SimpleIndexable};
