//! Typed leaves of a data row.
//!
//! Every field of a `row` element is one leaf whose element name carries the
//! value's type: `string`, `boolean`, `integer`, `double` or `timestamp`.

use crate::core::schema::SqlType;
use crate::core::value::SqlValue;
use crate::error::{BackupError, Result};

use super::{NodeCreator, NodeParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
    String,
    Boolean,
    Integer,
    Double,
    Timestamp,
}

impl Leaf {
    pub const fn name(self) -> &'static str {
        match self {
            Leaf::String => "string",
            Leaf::Boolean => "boolean",
            Leaf::Integer => "integer",
            Leaf::Double => "double",
            Leaf::Timestamp => "timestamp",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Leaf::String),
            "boolean" => Some(Leaf::Boolean),
            "integer" => Some(Leaf::Integer),
            "double" => Some(Leaf::Double),
            "timestamp" => Some(Leaf::Timestamp),
            _ => None,
        }
    }

    /// Leaf used for a column of the given type; `None` for types that
    /// cannot be encoded (binary data, vendor specific types).
    pub fn for_type(sql_type: SqlType) -> Option<Self> {
        if sql_type.is_text() {
            Some(Leaf::String)
        } else if matches!(sql_type, SqlType::Boolean | SqlType::Bit) {
            Some(Leaf::Boolean)
        } else if sql_type.is_integral() {
            Some(Leaf::Integer)
        } else if sql_type.is_fractional() {
            Some(Leaf::Double)
        } else if sql_type.is_temporal() {
            Some(Leaf::Timestamp)
        } else {
            None
        }
    }

    /// Leaf matching a non-null value.
    pub fn for_value(value: &SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => None,
            SqlValue::Text(_) => Some(Leaf::String),
            SqlValue::Bool(_) => Some(Leaf::Boolean),
            SqlValue::Integer(_) => Some(Leaf::Integer),
            SqlValue::Decimal(_) => Some(Leaf::Double),
            SqlValue::Timestamp(_) => Some(Leaf::Timestamp),
        }
    }
}

/// Append one field leaf. Nulls use `column_leaf` and carry the nil marker.
pub fn append(node: &mut dyn NodeCreator, column_leaf: Leaf, value: &SqlValue) -> Result<()> {
    let leaf = Leaf::for_value(value).unwrap_or(column_leaf);
    node.add_node(leaf.name())?;
    match value {
        SqlValue::Null => node.set_content_string(None)?,
        SqlValue::Text(s) => node.set_content_string(Some(s))?,
        SqlValue::Bool(b) => node.set_content_bool(Some(*b))?,
        SqlValue::Integer(i) => node.set_content_integer(Some(*i))?,
        SqlValue::Decimal(d) => node.set_content_decimal(Some(d))?,
        SqlValue::Timestamp(t) => node.set_content_date(Some(t))?,
    }
    node.close_entity()
}

/// Read the field leaf under the cursor, leaving the cursor on its close node.
pub fn read(node: &mut dyn NodeParser) -> Result<SqlValue> {
    let leaf = Leaf::from_name(node.name())
        .ok_or_else(|| BackupError::UnsupportedField(node.name().to_string()))?;
    Ok(match leaf {
        Leaf::String => node.content_as_string()?.into(),
        Leaf::Boolean => node.content_as_bool()?.into(),
        Leaf::Integer => node.content_as_integer()?.into(),
        Leaf::Double => node.content_as_decimal()?.into(),
        Leaf::Timestamp => node.content_as_date()?.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_names_round_trip() {
        for leaf in [Leaf::String, Leaf::Boolean, Leaf::Integer, Leaf::Double, Leaf::Timestamp] {
            assert_eq!(Leaf::from_name(leaf.name()), Some(leaf));
        }
        assert_eq!(Leaf::from_name("binary"), None);
    }

    #[test]
    fn test_leaf_for_type() {
        assert_eq!(Leaf::for_type(SqlType::VarChar), Some(Leaf::String));
        assert_eq!(Leaf::for_type(SqlType::Bit), Some(Leaf::Boolean));
        assert_eq!(Leaf::for_type(SqlType::BigInt), Some(Leaf::Integer));
        assert_eq!(Leaf::for_type(SqlType::Numeric), Some(Leaf::Double));
        assert_eq!(Leaf::for_type(SqlType::Date), Some(Leaf::Timestamp));
        assert_eq!(Leaf::for_type(SqlType::Blob), None);
        assert_eq!(Leaf::for_type(SqlType::Other(1111)), None);
    }
}
