//! Sort descriptors for ordering search hits.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::field_value::{FieldValue, ValueType};
use crate::error::{GlaiveError, Result};
use crate::segment::DocId;
use crate::segment::reader::SegmentReader;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// How the sort key of a hit is obtained and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortType {
    /// Relevance score; the field is ignored.
    Score,
    /// Index order, oldest segment first; the field is ignored.
    DocOrder,
    /// Doc value compared as text.
    Text,
    /// Doc value coerced to an integer.
    Integer,
    /// Doc value coerced to a float.
    Float,
    /// Doc value coerced to a date.
    Date,
}

impl SortType {
    fn value_type(self) -> Option<ValueType> {
        match self {
            SortType::Score | SortType::DocOrder => None,
            SortType::Text => Some(ValueType::Text),
            SortType::Integer => Some(ValueType::Integer),
            SortType::Float => Some(ValueType::Float),
            SortType::Date => Some(ValueType::Date),
        }
    }
}

impl FromStr for SortType {
    type Err = GlaiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "score" => Ok(SortType::Score),
            "doc" | "doc_order" => Ok(SortType::DocOrder),
            "text" | "string" => Ok(SortType::Text),
            "integer" | "int" | "long" => Ok(SortType::Integer),
            "float" | "double" => Ok(SortType::Float),
            "date" => Ok(SortType::Date),
            other => Err(GlaiveError::query_syntax(format!("unknown sort type: {other}"))),
        }
    }
}

/// One sort key: a field, a direction and a comparison type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortDescriptor {
    /// Field whose doc value is compared.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
    /// Comparison type.
    pub sort_type: SortType,
}

impl SortDescriptor {
    /// Create a descriptor.
    pub fn new<F: Into<String>>(field: F, direction: SortDirection, sort_type: SortType) -> Self {
        SortDescriptor {
            field: field.into(),
            direction,
            sort_type,
        }
    }

    /// Highest score first.
    pub fn by_score() -> Self {
        Self::new("", SortDirection::Descending, SortType::Score)
    }

    /// Index order.
    pub fn by_doc_order() -> Self {
        Self::new("", SortDirection::Ascending, SortType::DocOrder)
    }

    /// Ascending by the field's doc value.
    pub fn ascending<F: Into<String>>(field: F, sort_type: SortType) -> Self {
        Self::new(field, SortDirection::Ascending, sort_type)
    }

    /// Descending by the field's doc value.
    pub fn descending<F: Into<String>>(field: F, sort_type: SortType) -> Self {
        Self::new(field, SortDirection::Descending, sort_type)
    }

    /// Parse `field[:type][:asc|desc]`, e.g. `date:date:desc`.
    ///
    /// `score` and `doc` alone select relevance and index order.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(':').map(str::trim).collect();
        let direction = |part: Option<&&str>, default| match part.map(|p| p.to_ascii_lowercase()) {
            None => Ok(default),
            Some(p) if p == "asc" => Ok(SortDirection::Ascending),
            Some(p) if p == "desc" => Ok(SortDirection::Descending),
            Some(p) => Err(GlaiveError::query_syntax(format!("unknown sort direction: {p}"))),
        };
        match parts.as_slice() {
            ["score", rest @ ..] if rest.len() <= 1 => Ok(SortDescriptor {
                direction: direction(rest.first(), SortDirection::Descending)?,
                ..Self::by_score()
            }),
            ["doc", rest @ ..] if rest.len() <= 1 => Ok(SortDescriptor {
                direction: direction(rest.first(), SortDirection::Ascending)?,
                ..Self::by_doc_order()
            }),
            [field] => Ok(Self::ascending(*field, SortType::Text)),
            [field, kind] => match SortType::from_str(kind) {
                Ok(sort_type) => Ok(Self::ascending(*field, sort_type)),
                Err(_) => Ok(Self::new(
                    *field,
                    direction(Some(kind), SortDirection::Ascending)?,
                    SortType::Text,
                )),
            },
            [field, kind, dir] => Ok(Self::new(
                *field,
                direction(Some(dir), SortDirection::Ascending)?,
                SortType::from_str(kind)?,
            )),
            _ => Err(GlaiveError::query_syntax(format!("invalid sort descriptor: {text}"))),
        }
    }

    /// The key of one hit.
    pub fn key(&self, segment: &SegmentReader, doc_id: DocId, score: f32) -> SortValue {
        match self.sort_type.value_type() {
            None if self.sort_type == SortType::Score => SortValue::Float(f64::from(score)),
            None => SortValue::Missing,
            Some(value_type) => segment
                .doc_value(doc_id, &self.field)
                .and_then(|value| value.coerce(value_type))
                .map_or(SortValue::Missing, SortValue::from),
        }
    }

    /// Compare two keys produced by this descriptor.
    ///
    /// Missing values sort last in either direction.
    pub fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering {
        match (a, b) {
            (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
            (SortValue::Missing, _) => Ordering::Greater,
            (_, SortValue::Missing) => Ordering::Less,
            _ => {
                let ordering = a.cmp_present(b);
                match self.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            }
        }
    }

    /// Whether this key orders by index position.
    pub fn is_doc_order(&self) -> bool {
        self.sort_type == SortType::DocOrder
    }
}

impl fmt::Display for SortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        };
        match self.sort_type {
            SortType::Score => write!(f, "score:{direction}"),
            SortType::DocOrder => write!(f, "doc:{direction}"),
            sort_type => write!(f, "{}:{:?}:{direction}", self.field, sort_type),
        }
    }
}

/// A comparable sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    /// Text key.
    Text(String),
    /// Integer or date (epoch seconds) key.
    Integer(i64),
    /// Float or score key.
    Float(f64),
    /// The document has no value.
    Missing,
}

impl SortValue {
    fn cmp_present(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Integer(a), SortValue::Integer(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Integer(a), SortValue::Float(b)) => (*a as f64).total_cmp(b),
            (SortValue::Float(a), SortValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            _ => Ordering::Equal,
        }
    }
}

impl From<FieldValue> for SortValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => SortValue::Text(text),
            FieldValue::Integer(i) => SortValue::Integer(i),
            FieldValue::Float(f) => SortValue::Float(f),
            FieldValue::Date(date) => SortValue::Integer(date.timestamp()),
        }
    }
}
