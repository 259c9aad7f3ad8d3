//! Table, column and foreign key definitions.
//!
//! These are plain values: built once by schema introspection (export) or by
//! parsing a backup document (import), then shared read-only through the run
//! [`Context`](crate::core::Context).

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest scale every supported vendor accepts (MySQL's limit).
pub const MAX_SCALE: i32 = 30;

/// Vendor-neutral SQL type, numbered like `java.sql.Types`.
///
/// The integer code is what a backup document stores in a column's
/// `sqlType` attribute, so the numbering is part of the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Boolean,
    Clob,
    NChar,
    NVarChar,
    LongNVarChar,
    NClob,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    /// Any code not listed above, preserved as-is.
    Other(i32),
}

impl SqlType {
    /// The stable integer code of this type.
    pub const fn code(self) -> i32 {
        match self {
            SqlType::Bit => -7,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Float => 6,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Numeric => 2,
            SqlType::Decimal => 3,
            SqlType::Char => 1,
            SqlType::VarChar => 12,
            SqlType::LongVarChar => -1,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Boolean => 16,
            SqlType::Clob => 2005,
            SqlType::NChar => -15,
            SqlType::NVarChar => -9,
            SqlType::LongNVarChar => -16,
            SqlType::NClob => 2011,
            SqlType::Binary => -2,
            SqlType::VarBinary => -3,
            SqlType::LongVarBinary => -4,
            SqlType::Blob => 2004,
            SqlType::Other(code) => code,
        }
    }

    /// Resolve an integer code, keeping unknown codes as [`SqlType::Other`].
    pub const fn from_code(code: i32) -> Self {
        match code {
            -7 => SqlType::Bit,
            -6 => SqlType::TinyInt,
            5 => SqlType::SmallInt,
            4 => SqlType::Integer,
            -5 => SqlType::BigInt,
            6 => SqlType::Float,
            7 => SqlType::Real,
            8 => SqlType::Double,
            2 => SqlType::Numeric,
            3 => SqlType::Decimal,
            1 => SqlType::Char,
            12 => SqlType::VarChar,
            -1 => SqlType::LongVarChar,
            91 => SqlType::Date,
            92 => SqlType::Time,
            93 => SqlType::Timestamp,
            16 => SqlType::Boolean,
            2005 => SqlType::Clob,
            -15 => SqlType::NChar,
            -9 => SqlType::NVarChar,
            -16 => SqlType::LongNVarChar,
            2011 => SqlType::NClob,
            -2 => SqlType::Binary,
            -3 => SqlType::VarBinary,
            -4 => SqlType::LongVarBinary,
            2004 => SqlType::Blob,
            other => SqlType::Other(other),
        }
    }

    /// Upper-case type name used in diagnostics.
    pub fn name(self) -> String {
        let name = match self {
            SqlType::Bit => "BIT",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Char => "CHAR",
            SqlType::VarChar => "VARCHAR",
            SqlType::LongVarChar => "LONGVARCHAR",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Clob => "CLOB",
            SqlType::NChar => "NCHAR",
            SqlType::NVarChar => "NVARCHAR",
            SqlType::LongNVarChar => "LONGNVARCHAR",
            SqlType::NClob => "NCLOB",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::LongVarBinary => "LONGVARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Other(code) => return format!("OTHER({})", code),
        };
        name.to_string()
    }

    /// Character types, exported as `string` leaves.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::LongVarChar
                | SqlType::Clob
                | SqlType::NChar
                | SqlType::NVarChar
                | SqlType::LongNVarChar
                | SqlType::NClob
        )
    }

    /// Exact whole-number types, exported as `integer` leaves.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }

    /// Fractional numeric types, exported as `double` leaves.
    pub fn is_fractional(self) -> bool {
        matches!(
            self,
            SqlType::Float | SqlType::Real | SqlType::Double | SqlType::Numeric | SqlType::Decimal
        )
    }

    /// Temporal types, exported as `timestamp` leaves.
    pub fn is_temporal(self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::Timestamp)
    }
}

/// Column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Vendor-neutral type.
    pub sql_type: SqlType,

    /// Part of the primary key.
    pub primary_key: bool,

    /// Backed by an identity, serial or sequence-plus-trigger.
    pub auto_increment: bool,

    /// Precision or maximum length, when the vendor reports one.
    pub precision: Option<i32>,

    /// Scale for numeric types.
    pub scale: Option<i32>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: false,
            auto_increment: false,
            precision: None,
            scale: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Set the scale, clamped to the precision and to [`MAX_SCALE`].
    pub fn with_scale(mut self, scale: i32) -> Self {
        let mut clamped = scale;
        if let Some(precision) = self.precision {
            if clamped > precision {
                warn!(
                    "Scale {} of column {} exceeds its precision {}, using {}",
                    scale, self.name, precision, precision
                );
                clamped = precision;
            }
        }
        if clamped > MAX_SCALE {
            warn!(
                "Scale {} of column {} exceeds the maximum of {}, using {}",
                clamped, self.name, MAX_SCALE, MAX_SCALE
            );
            clamped = MAX_SCALE;
        }
        self.scale = Some(clamped);
        self
    }
}

/// Foreign key, attached to the table on its "from" side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referencing table.
    pub from_table: String,

    /// Referencing column.
    pub from_column: String,

    /// Referenced table.
    pub to_table: String,

    /// Referenced column.
    pub to_column: String,
}

impl ForeignKey {
    /// Build a foreign key, deriving the constraint name when none is given.
    pub fn new(
        name: Option<&str>,
        from_table: impl Into<String>,
        from_column: impl Into<String>,
        to_table: impl Into<String>,
        to_column: impl Into<String>,
    ) -> Self {
        let from_table = from_table.into();
        let from_column = from_column.into();
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("fk_{}_{}", from_table, from_column).to_lowercase(),
        };
        Self {
            name,
            from_table,
            from_column,
            to_table: to_table.into(),
            to_column: to_column.into(),
        }
    }
}

/// Table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions, in table order.
    pub columns: Vec<Column>,

    /// Foreign keys whose "from" side is this table.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>, foreign_keys: Vec<ForeignKey>) -> Self {
        Self {
            name: name.into(),
            columns,
            foreign_keys,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Auto-increment columns in table order.
    pub fn auto_increment_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.auto_increment)
    }

    pub fn has_auto_increment(&self) -> bool {
        self.columns.iter().any(|c| c.auto_increment)
    }

    /// A copy of this table without its foreign keys.
    pub fn without_foreign_keys(&self) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            foreign_keys: Vec::new(),
        }
    }
}

/// Split tables into key-less copies plus the foreign keys they carried.
pub fn strip_foreign_keys(tables: &[Table]) -> (Vec<Table>, Vec<ForeignKey>) {
    let stripped = tables.iter().map(Table::without_foreign_keys).collect();
    let foreign_keys = tables
        .iter()
        .flat_map(|t| t.foreign_keys.iter().cloned())
        .collect();
    (stripped, foreign_keys)
}

/// Order tables so that every table comes before the tables it references.
///
/// Reverse the result to drop dependents first. Cycles fall back to input order.
pub fn order_by_dependencies(tables: &[Table]) -> Vec<&Table> {
    let mut ordered: Vec<&Table> = Vec::with_capacity(tables.len());
    let mut remaining: Vec<&Table> = tables.iter().collect();

    while !remaining.is_empty() {
        let before = remaining.len();
        remaining.retain(|table| {
            let ready = table.foreign_keys.iter().all(|fk| {
                fk.to_table == table.name
                    || ordered.iter().any(|t| t.name == fk.to_table)
                    || !tables.iter().any(|t| t.name == fk.to_table)
            });
            if ready {
                ordered.push(*table);
            }
            !ready
        });
        if remaining.len() == before {
            ordered.append(&mut remaining);
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_type_codes_are_stable() {
        assert_eq!(SqlType::Integer.code(), 4);
        assert_eq!(SqlType::VarChar.code(), 12);
        assert_eq!(SqlType::Timestamp.code(), 93);
        assert_eq!(SqlType::Bit.code(), -7);
        assert_eq!(SqlType::from_code(-5), SqlType::BigInt);
        assert_eq!(SqlType::from_code(1111), SqlType::Other(1111));
        assert_eq!(SqlType::Other(1111).code(), 1111);
        assert_eq!(SqlType::Other(1111).name(), "OTHER(1111)");
    }

    #[test]
    fn test_scale_clamped_to_precision() {
        let col = Column::new("PRICE", SqlType::Numeric)
            .with_precision(5)
            .with_scale(8);
        assert_eq!(col.scale, Some(5));
    }

    #[test]
    fn test_scale_clamped_to_max() {
        let col = Column::new("RATIO", SqlType::Numeric)
            .with_precision(38)
            .with_scale(35);
        assert_eq!(col.scale, Some(MAX_SCALE));

        let col = Column::new("RATIO", SqlType::Numeric).with_scale(2);
        assert_eq!(col.scale, Some(2));
    }

    #[test]
    fn test_foreign_key_default_name() {
        let fk = ForeignKey::new(None, "AO_CHAPTER", "BOOK_ID", "AO_BOOK", "ID");
        assert_eq!(fk.name, "fk_ao_chapter_book_id");
        let fk = ForeignKey::new(Some("fk_custom"), "A", "B", "C", "D");
        assert_eq!(fk.name, "fk_custom");
    }

    #[test]
    fn test_strip_foreign_keys() {
        let fk = ForeignKey::new(None, "CHILD", "PARENT_ID", "PARENT", "ID");
        let tables = vec![
            Table::new("PARENT", vec![Column::new("ID", SqlType::Integer)], vec![]),
            Table::new(
                "CHILD",
                vec![Column::new("PARENT_ID", SqlType::Integer)],
                vec![fk.clone()],
            ),
        ];
        let (stripped, fks) = strip_foreign_keys(&tables);
        assert!(stripped.iter().all(|t| t.foreign_keys.is_empty()));
        assert_eq!(fks, vec![fk]);
    }

    #[test]
    fn test_order_by_dependencies() {
        let tables = vec![
            Table::new(
                "CHILD",
                vec![],
                vec![ForeignKey::new(None, "CHILD", "P", "PARENT", "ID")],
            ),
            Table::new("PARENT", vec![], vec![]),
            Table::new(
                "SELF",
                vec![],
                vec![ForeignKey::new(None, "SELF", "S", "SELF", "ID")],
            ),
        ];
        let names: Vec<_> = order_by_dependencies(&tables)
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["PARENT", "SELF", "CHILD"]);
    }
}
