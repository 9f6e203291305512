// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Value type for cardest - typed datums stored in histogram bounds
//!
//! A `Value` is what a histogram boundary or an MCV entry holds. Ordering and
//! distance between values are exposed here for the built-in catalog; the
//! statistics code itself only reaches them through `TypeCatalog`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Error, Result};
use super::types::DataType;

/// Timestamp formats supported for parsing
/// Order matters - more specific formats first
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z", // RFC3339 with fractional seconds
    "%Y-%m-%dT%H:%M:%S%:z",    // RFC3339
    "%Y-%m-%dT%H:%M:%SZ",      // RFC3339 UTC
    "%Y-%m-%dT%H:%M:%S",       // ISO without timezone
    "%Y-%m-%d %H:%M:%S%.f",    // SQL-style with fractional seconds
    "%Y-%m-%d %H:%M:%S",       // SQL-style
];

/// A typed datum
///
/// Text uses Arc<str> so that bucket bounds can be cloned freely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// NULL value with optional type hint
    Null(DataType),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text string
    Text(Arc<str>),

    /// Boolean value
    Boolean(bool),

    /// Timestamp (UTC)
    Timestamp(DateTime<Utc>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a NULL value with a type hint
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    /// Create a float value
    pub fn float(value: f64) -> Self {
        Value::Float(value)
    }

    /// Create a text value
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(Arc::from(value.into().as_str()))
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create a timestamp value
    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }

    /// Create a timestamp value from microseconds since the epoch
    pub fn timestamp_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Value::Timestamp)
    }

    /// Parse a literal of the given type
    pub fn parse_typed(s: &str, data_type: DataType) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("NULL") {
            return Ok(Value::Null(data_type));
        }
        match data_type {
            DataType::Null => Err(Error::parse(format!("non-NULL literal of NULL type: {}", s))),
            DataType::Integer => s
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| Error::parse(format!("invalid integer '{}': {}", s, e))),
            DataType::Float => s
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Error::parse(format!("invalid float '{}': {}", s, e))),
            DataType::Text => Ok(Value::text(s)),
            DataType::Boolean => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Boolean(true)),
                "false" | "f" | "0" => Ok(Value::Boolean(false)),
                _ => Err(Error::parse(format!("invalid boolean: {}", s))),
            },
            DataType::Timestamp => parse_timestamp(s).map(Value::Timestamp),
        }
    }

    // =========================================================================
    // Type accessors
    // =========================================================================

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(dt) => *dt,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    // =========================================================================
    // Value extractors
    // =========================================================================

    /// Integer image of an integer-mapped value
    ///
    /// Booleans map to 0/1 and timestamps to microseconds since the epoch.
    /// Returns None for NULL and for types without an integer mapping.
    pub fn as_mapped_int(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Timestamp(t) => Some(t.timestamp_micros()),
            _ => None,
        }
    }

    /// Position of the value on the real line, used for distances
    ///
    /// Text maps its first eight bytes, big-endian, onto a u64 so that the
    /// lexicographic order is preserved for prefixes.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Null(_) => None,
            Value::Float(v) => Some(*v),
            Value::Text(s) => Some(text_prefix_key(s) as f64),
            other => other.as_mapped_int().map(|v| v as f64),
        }
    }

    /// Returns the string slice of a text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Compare two values for ordering
    ///
    /// Returns:
    /// - Ok(Ordering::Less) if self < other
    /// - Ok(Ordering::Equal) if self == other
    /// - Ok(Ordering::Greater) if self > other
    /// - Err if comparison is not possible
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if self.is_null() || other.is_null() {
            if self.is_null() && other.is_null() {
                return Ok(Ordering::Equal);
            }
            return Err(Error::NullComparison);
        }

        if self.data_type() == other.data_type() {
            return self.compare_same_type(other);
        }

        // Integer vs float
        if self.data_type().is_numeric() && other.data_type().is_numeric() {
            if let (Some(v1), Some(v2)) = (self.as_double(), other.as_double()) {
                return Ok(compare_floats(v1, v2));
            }
        }

        Err(Error::IncomparableTypes)
    }

    /// Compare values of the same type
    fn compare_same_type(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_floats(*a, *b)),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            _ => Err(Error::IncomparableTypes),
        }
    }

    /// Smallest value strictly greater than this one, for integer-mapped types
    pub fn successor(&self) -> Option<Value> {
        match self {
            Value::Integer(v) => v.checked_add(1).map(Value::Integer),
            Value::Boolean(false) => Some(Value::Boolean(true)),
            Value::Timestamp(t) => t
                .timestamp_micros()
                .checked_add(1)
                .and_then(Value::timestamp_micros),
            _ => None,
        }
    }
}

// =========================================================================
// Trait implementations
// =========================================================================

impl Default for Value {
    fn default() -> Self {
        Value::Null(DataType::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_null() && other.is_null() {
            return true;
        }
        if self.is_null() || other.is_null() {
            return false;
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                // NaN equals NaN here so that bounds stay reflexive
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                *f == (*i as f64)
            }
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Integer(5) == Float(5.0), so both hash as f64 bits
        match self {
            Value::Null(dt) => {
                0u8.hash(state);
                dt.hash(state);
            }
            Value::Integer(v) => {
                1u8.hash(state);
                (*v as f64).to_bits().hash(state);
            }
            Value::Float(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Value::Timestamp(t) => {
                4u8.hash(state);
                t.timestamp_micros().hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

// =========================================================================
// From implementations for convenient construction
// =========================================================================

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

// =========================================================================
// Helper functions
// =========================================================================

/// Parse a timestamp string with multiple format support
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    Err(Error::parse(format!("invalid timestamp format: {}", s)))
}

/// Big-endian image of the first eight bytes of a string
fn text_prefix_key(s: &str) -> u64 {
    let mut buf = [0u8; 8];
    let bytes = s.as_bytes();
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_be_bytes(buf)
}

/// Format a float value consistently
fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:?}", v);
        if s.contains('.') && !s.contains('e') && !s.contains('E') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

/// Compare two floats with proper NaN handling
fn compare_floats(a: f64, b: f64) -> Ordering {
    // NaN sorts after every other value
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Construction tests
    // =========================================================================

    #[test]
    fn test_parse_typed() {
        assert_eq!(
            Value::parse_typed("42", DataType::Integer).unwrap(),
            Value::integer(42)
        );
        assert_eq!(
            Value::parse_typed("2.5", DataType::Float).unwrap(),
            Value::float(2.5)
        );
        assert_eq!(
            Value::parse_typed("t", DataType::Boolean).unwrap(),
            Value::boolean(true)
        );
        assert!(Value::parse_typed("null", DataType::Text)
            .unwrap()
            .is_null());
        assert!(Value::parse_typed("abc", DataType::Integer).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("2024-01-15 10:30:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        let date = parse_timestamp("2024-01-15").unwrap();
        assert_eq!(date.timestamp() % 86400, 0);
        assert!(parse_timestamp("yesterday").is_err());
    }

    // =========================================================================
    // Mapping tests
    // =========================================================================

    #[test]
    fn test_integer_mapping() {
        assert_eq!(Value::integer(-3).as_mapped_int(), Some(-3));
        assert_eq!(Value::boolean(true).as_mapped_int(), Some(1));
        assert_eq!(
            Value::timestamp_micros(1_000_000).unwrap().as_mapped_int(),
            Some(1_000_000)
        );
        assert_eq!(Value::float(1.0).as_mapped_int(), None);
        assert_eq!(Value::text("a").as_mapped_int(), None);
    }

    #[test]
    fn test_text_prefix_preserves_order() {
        let a = Value::text("apple").as_double().unwrap();
        let b = Value::text("banana").as_double().unwrap();
        let ab = Value::text("ab").as_double().unwrap();
        assert!(a < b);
        assert!(ab < a);
        assert_eq!(text_prefix_key(""), 0);
    }

    #[test]
    fn test_successor() {
        assert_eq!(Value::integer(5).successor(), Some(Value::integer(6)));
        assert_eq!(Value::integer(i64::MAX).successor(), None);
        assert_eq!(
            Value::boolean(false).successor(),
            Some(Value::boolean(true))
        );
        assert_eq!(Value::boolean(true).successor(), None);
        assert_eq!(Value::float(1.0).successor(), None);
    }

    // =========================================================================
    // Comparison tests
    // =========================================================================

    #[test]
    fn test_compare() {
        assert_eq!(
            Value::integer(1).compare(&Value::integer(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::integer(2).compare(&Value::float(1.5)).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Value::text("b").compare(&Value::text("a")).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Value::integer(1).compare(&Value::text("1")),
            Err(Error::IncomparableTypes)
        );
        assert_eq!(
            Value::null(DataType::Integer).compare(&Value::integer(1)),
            Err(Error::NullComparison)
        );
    }

    #[test]
    fn test_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        assert_eq!(Value::integer(5), Value::float(5.0));
        assert_eq!(hash_of(&Value::integer(5)), hash_of(&Value::float(5.0)));
        assert_eq!(Value::float(f64::NAN), Value::float(f64::NAN));
        assert_ne!(Value::integer(1), Value::boolean(true));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::integer(7).to_string(), "7");
        assert_eq!(Value::float(2.50).to_string(), "2.5");
        assert_eq!(Value::text("x").to_string(), "'x'");
        assert_eq!(Value::null(DataType::Text).to_string(), "NULL");
    }
}
