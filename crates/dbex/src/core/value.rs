//! SQL values as they travel between a database and a backup document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single column value.
///
/// The variants line up with the typed leaves of a backup row: every
/// non-null value is written as exactly one of `string`, `boolean`,
/// `integer`, `double` or `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Character data.
    Text(String),

    /// Boolean or bit value.
    Bool(bool),

    /// Whole number.
    Integer(i64),

    /// Exact or approximate fractional number.
    Decimal(Decimal),

    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Integer(_) => "integer",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }

    /// Integer view of a scalar query result.
    ///
    /// Decimals are truncated toward zero; anything else is `None`.
    pub fn as_i64(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        match self {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Decimal(d) => d.trunc().to_i64(),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row of values in column order.
pub type Row = Vec<SqlValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_conversion() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
        assert!(SqlValue::from(None::<bool>).is_null());
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(SqlValue::Integer(41).as_i64(), Some(41));
        assert_eq!(SqlValue::Decimal(Decimal::new(4299, 2)).as_i64(), Some(42));
        assert_eq!(SqlValue::Null.as_i64(), None);
        assert_eq!(SqlValue::Text("1".into()).as_i64(), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SqlValue::Null.kind(), "null");
        assert_eq!(SqlValue::Timestamp(Utc::now()).kind(), "timestamp");
    }
}
