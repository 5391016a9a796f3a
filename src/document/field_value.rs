//! Field value types for documents.
//!
//! A [`FieldValue`] is one of text, date, integer or float. Non-text values
//! are indexed as a single comparable key ([`FieldValue::canonical_key`]) so
//! that range scans over the sorted term dictionary compare them correctly:
//!
//! - dates are converted to UTC and rendered as `%Y%m%d%H%M%S`
//! - integers have their sign bit flipped and are rendered as 16 hex digits
//! - floats use the IEEE-754 total order transform, also 16 hex digits
//!
//! ```
//! use glaive::document::field_value::{FieldValue, ValueType};
//!
//! let minus = FieldValue::Integer(-5).canonical_key();
//! let plus = FieldValue::Integer(3).canonical_key();
//! assert!(minus < plus);
//!
//! let parsed = FieldValue::Text("42".to_string()).coerce(ValueType::Float);
//! assert_eq!(parsed, Some(FieldValue::Float(42.0)));
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Canonical date format used for indexing and range queries.
pub const DATE_KEY_FORMAT: &str = "%Y%m%d%H%M%S";

const SIGN_BIT: u64 = 1 << 63;

/// The type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// UTF-8 text.
    Text,
    /// A point in time.
    Date,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
}

impl ValueType {
    /// Stable one-byte tag used in segment metadata.
    pub fn tag(self) -> u8 {
        match self {
            ValueType::Text => 0,
            ValueType::Date => 1,
            ValueType::Integer => 2,
            ValueType::Float => 3,
        }
    }

    /// Inverse of [`ValueType::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueType::Text),
            1 => Some(ValueType::Date),
            2 => Some(ValueType::Integer),
            3 => Some(ValueType::Float),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Text => "text",
            ValueType::Date => "date",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
        };
        f.write_str(name)
    }
}

/// Represents a value for a field in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Date value, always held in UTC.
    Date(DateTime<Utc>),
    /// Integer value.
    Integer(i64),
    /// Float value.
    Float(f64),
}

impl FieldValue {
    /// Get the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Text(_) => ValueType::Text,
            FieldValue::Date(_) => ValueType::Date,
            FieldValue::Integer(_) => ValueType::Integer,
            FieldValue::Float(_) => ValueType::Float,
        }
    }

    /// Get the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a date, if it is one.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float, if it is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The comparable key under which this value is indexed.
    ///
    /// Text is returned unchanged; other types use the fixed-width encodings
    /// described in the module documentation.
    pub fn canonical_key(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.format(DATE_KEY_FORMAT).to_string(),
            FieldValue::Integer(i) => format!("{:016x}", (*i as u64) ^ SIGN_BIT),
            FieldValue::Float(f) => {
                let bits = f.to_bits();
                let ordered = if bits & SIGN_BIT != 0 {
                    !bits
                } else {
                    bits | SIGN_BIT
                };
                format!("{ordered:016x}")
            }
        }
    }

    /// Convert this value to another type.
    ///
    /// Text is parsed, integers and floats convert into each other, and dates
    /// convert to and from epoch seconds. Returns `None` when the value
    /// cannot be represented in the target type.
    pub fn coerce(&self, target: ValueType) -> Option<FieldValue> {
        if self.value_type() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (_, ValueType::Text) => Some(FieldValue::Text(self.to_string())),

            (FieldValue::Text(s), ValueType::Integer) => {
                let s = s.trim();
                s.parse::<i64>().ok().map(FieldValue::Integer).or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .and_then(float_to_integer)
                        .map(FieldValue::Integer)
                })
            }
            (FieldValue::Text(s), ValueType::Float) => {
                s.trim().parse::<f64>().ok().map(FieldValue::Float)
            }
            (FieldValue::Text(s), ValueType::Date) => parse_date(s).map(FieldValue::Date),

            (FieldValue::Integer(i), ValueType::Float) => Some(FieldValue::Float(*i as f64)),
            (FieldValue::Float(f), ValueType::Integer) => {
                float_to_integer(*f).map(FieldValue::Integer)
            }

            (FieldValue::Date(d), ValueType::Integer) => Some(FieldValue::Integer(d.timestamp())),
            (FieldValue::Date(d), ValueType::Float) => {
                Some(FieldValue::Float(d.timestamp() as f64))
            }
            (FieldValue::Integer(i), ValueType::Date) => {
                Utc.timestamp_opt(*i, 0).single().map(FieldValue::Date)
            }
            (FieldValue::Float(f), ValueType::Date) => float_to_integer(*f)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(FieldValue::Date),

            _ => None,
        }
    }
}

fn float_to_integer(value: f64) -> Option<i64> {
    if value.is_finite() && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

/// Parse a date in one of the accepted textual forms.
///
/// Accepts RFC 3339 (with offset), the canonical `%Y%m%d%H%M%S` key,
/// `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d` and `%Y%m%d`.
/// Values without an offset are taken as UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [DATE_KEY_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => f.write_str(&d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for FieldValue {
    fn from(value: DateTime<Tz>) -> Self {
        FieldValue::Date(value.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_integer_keys_sort_numerically() {
        let values = [i64::MIN, -100, -1, 0, 1, 99, i64::MAX];
        let keys: Vec<String> = values
            .iter()
            .map(|v| FieldValue::Integer(*v).canonical_key())
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.iter().all(|k| k.len() == 16));
    }

    #[test]
    fn test_float_keys_sort_numerically() {
        let values = [f64::NEG_INFINITY, -2.5, -0.1, 0.0, 0.1, 3.0, 1e300];
        let keys: Vec<String> = values
            .iter()
            .map(|v| FieldValue::Float(*v).canonical_key())
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_date_key_is_utc() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 2, 1, 8, 59, 59).unwrap();
        let value = FieldValue::from(local);

        assert_eq!(value.canonical_key(), "20240131235959");
    }

    #[test]
    fn test_coerce_text() {
        let text = FieldValue::Text(" 17 ".to_string());
        assert_eq!(text.coerce(ValueType::Integer), Some(FieldValue::Integer(17)));
        assert_eq!(text.coerce(ValueType::Float), Some(FieldValue::Float(17.0)));
        assert_eq!(
            FieldValue::Text("abc".to_string()).coerce(ValueType::Integer),
            None
        );

        let date = FieldValue::Text("20240131235959".to_string())
            .coerce(ValueType::Date)
            .unwrap();
        assert_eq!(date.canonical_key(), "20240131235959");
    }

    #[test]
    fn test_coerce_between_numbers_and_dates() {
        assert_eq!(
            FieldValue::Float(2.9).coerce(ValueType::Integer),
            Some(FieldValue::Integer(2))
        );
        assert_eq!(FieldValue::Float(f64::NAN).coerce(ValueType::Integer), None);

        let date = FieldValue::Integer(86_400).coerce(ValueType::Date).unwrap();
        assert_eq!(date.canonical_key(), "19700102000000");
        assert_eq!(date.coerce(ValueType::Integer), Some(FieldValue::Integer(86_400)));
        assert_eq!(date.to_string(), "1970-01-02T00:00:00Z");
    }

    #[test]
    fn test_parse_date_forms() {
        for text in [
            "2024-01-31",
            "20240131",
            "2024-01-31 00:00:00",
            "2024-01-31T00:00:00Z",
            "2024-01-31T09:00:00+09:00",
        ] {
            let parsed = parse_date(text).unwrap();
            assert_eq!(parsed.format(DATE_KEY_FORMAT).to_string(), "20240131000000");
        }
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn test_value_type_tags() {
        for value_type in [
            ValueType::Text,
            ValueType::Date,
            ValueType::Integer,
            ValueType::Float,
        ] {
            assert_eq!(ValueType::from_tag(value_type.tag()), Some(value_type));
        }
        assert_eq!(ValueType::from_tag(9), None);
    }
}
