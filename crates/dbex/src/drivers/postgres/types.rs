//! Mapping between PostgreSQL types and [`SqlType`] / [`SqlValue`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;

use crate::core::{Column, SqlType, SqlValue};
use crate::error::{BackupError, Result};

/// Vendor-neutral type of a column reported by `information_schema` (`udt_name`).
pub fn sql_type_from_udt(udt: &str) -> SqlType {
    match udt {
        "bool" => SqlType::Boolean,
        "int2" => SqlType::SmallInt,
        "int4" => SqlType::Integer,
        "int8" => SqlType::BigInt,
        "float4" => SqlType::Real,
        "float8" => SqlType::Double,
        "numeric" => SqlType::Numeric,
        "bpchar" => SqlType::Char,
        "varchar" => SqlType::VarChar,
        "text" => SqlType::LongVarChar,
        "date" => SqlType::Date,
        "time" => SqlType::Time,
        "timestamp" | "timestamptz" => SqlType::Timestamp,
        "bytea" => SqlType::LongVarBinary,
        _ => SqlType::Other(1111),
    }
}

/// Vendor-neutral type of a result or parameter type.
pub fn sql_type_from_pg(ty: &Type) -> SqlType {
    sql_type_from_udt(ty.name())
}

/// Column type for `CREATE TABLE`. Auto-increment integers become serials.
pub fn ddl_type(column: &Column) -> Result<String> {
    let length = column.precision.filter(|p| *p > 0);
    let ddl = match column.sql_type {
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer if column.auto_increment => {
            "SERIAL".to_string()
        }
        SqlType::BigInt if column.auto_increment => "BIGSERIAL".to_string(),
        SqlType::Bit | SqlType::Boolean => "BOOLEAN".to_string(),
        SqlType::TinyInt | SqlType::SmallInt => "SMALLINT".to_string(),
        SqlType::Integer => "INTEGER".to_string(),
        SqlType::BigInt => "BIGINT".to_string(),
        SqlType::Real => "REAL".to_string(),
        SqlType::Float | SqlType::Double => "DOUBLE PRECISION".to_string(),
        SqlType::Numeric | SqlType::Decimal => match (length, column.scale) {
            (Some(p), Some(s)) => format!("NUMERIC({}, {})", p, s),
            (Some(p), None) => format!("NUMERIC({})", p),
            _ => "NUMERIC".to_string(),
        },
        SqlType::Char | SqlType::NChar => match length {
            Some(n) => format!("CHAR({})", n),
            None => "CHAR".to_string(),
        },
        SqlType::VarChar | SqlType::NVarChar => match length {
            Some(n) => format!("VARCHAR({})", n),
            None => "VARCHAR".to_string(),
        },
        SqlType::LongVarChar | SqlType::LongNVarChar | SqlType::Clob | SqlType::NClob => {
            "TEXT".to_string()
        }
        SqlType::Date => "DATE".to_string(),
        SqlType::Time => "TIME".to_string(),
        SqlType::Timestamp => "TIMESTAMP".to_string(),
        SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
            "BYTEA".to_string()
        }
        SqlType::Other(code) => {
            return Err(BackupError::Sql(format!(
                "No PostgreSQL type for SQL type code {} of column {}",
                code, column.name
            )))
        }
    };
    Ok(ddl)
}

/// Decode column `index` of a row.
pub fn read_value(row: &Row, index: usize) -> Result<SqlValue> {
    let ty = row.columns()[index].type_().clone();
    let value = match ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(i64::from).into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(i64::from).into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.into(),
        Type::FLOAT4 => float(row.try_get::<_, Option<f32>>(index)?.map(f64::from))?,
        Type::FLOAT8 => float(row.try_get::<_, Option<f64>>(index)?)?,
        Type::NUMERIC => row.try_get::<_, Option<Decimal>>(index)?.into(),
        Type::BPCHAR | Type::VARCHAR | Type::TEXT | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.into()
        }
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .into(),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(index)?
            .map(|t| NaiveDate::default().and_time(t).and_utc())
            .into(),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(|t| t.and_utc())
            .into(),
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(index)?.into(),
        other => {
            return Err(BackupError::Sql(format!(
                "Cannot read column {} of type {}",
                row.columns()[index].name(),
                other
            )))
        }
    };
    Ok(value)
}

fn float(value: Option<f64>) -> Result<SqlValue> {
    value
        .map(|f| {
            Decimal::from_f64(f)
                .ok_or_else(|| BackupError::Sql(format!("{} cannot be represented as a decimal", f)))
        })
        .transpose()
        .map(SqlValue::from)
}

/// A statement parameter, owned so a row can be bound in one go.
pub type Param = Box<dyn ToSql + Sync + Send>;

/// Convert a value for a parameter of type `ty`. Nulls are typed so the
/// server accepts them.
pub fn to_param(value: &SqlValue, ty: &Type) -> Result<Param> {
    let mismatch = || {
        BackupError::Sql(format!(
            "Cannot bind a {} value to a parameter of type {}",
            value.kind(),
            ty
        ))
    };

    let param: Param = match *ty {
        Type::BOOL => Box::new(match value {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Integer(i) => Some(*i != 0),
            _ => return Err(mismatch()),
        }),
        Type::INT2 => Box::new(integer(value)?.map(i16::try_from).transpose().map_err(|_| mismatch())?),
        Type::INT4 => Box::new(integer(value)?.map(i32::try_from).transpose().map_err(|_| mismatch())?),
        Type::INT8 => Box::new(integer(value)?),
        Type::FLOAT4 => Box::new(decimal(value)?.and_then(|d| d.to_f32())),
        Type::FLOAT8 => Box::new(decimal(value)?.and_then(|d| d.to_f64())),
        Type::NUMERIC => Box::new(decimal(value)?),
        Type::BPCHAR | Type::VARCHAR | Type::TEXT | Type::NAME => Box::new(match value {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Decimal(d) => Some(d.to_string()),
            SqlValue::Timestamp(_) => return Err(mismatch()),
        }),
        Type::DATE => Box::new(timestamp(value).ok_or_else(mismatch)?.map(|t| t.date_naive())),
        Type::TIME => Box::new(timestamp(value).ok_or_else(mismatch)?.map(|t| t.time())),
        Type::TIMESTAMP => Box::new(timestamp(value).ok_or_else(mismatch)?.map(|t| t.naive_utc())),
        Type::TIMESTAMPTZ => Box::new(timestamp(value).ok_or_else(mismatch)?),
        _ => return Err(mismatch()),
    };
    Ok(param)
}

fn integer(value: &SqlValue) -> Result<Option<i64>> {
    match value {
        SqlValue::Null => Ok(None),
        other => other.as_i64().map(Some).ok_or_else(|| {
            BackupError::Sql(format!("Cannot bind a {} value as an integer", other.kind()))
        }),
    }
}

fn decimal(value: &SqlValue) -> Result<Option<Decimal>> {
    match value {
        SqlValue::Null => Ok(None),
        SqlValue::Decimal(d) => Ok(Some(*d)),
        SqlValue::Integer(i) => Ok(Some(Decimal::from(*i))),
        other => Err(BackupError::Sql(format!(
            "Cannot bind a {} value as a number",
            other.kind()
        ))),
    }
}

/// `Some(None)` for null, `None` for a non-temporal value.
fn timestamp(value: &SqlValue) -> Option<Option<DateTime<Utc>>> {
    match value {
        SqlValue::Null => Some(None),
        SqlValue::Timestamp(t) => Some(Some(*t)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udt_mapping() {
        assert_eq!(sql_type_from_udt("int4"), SqlType::Integer);
        assert_eq!(sql_type_from_udt("varchar"), SqlType::VarChar);
        assert_eq!(sql_type_from_udt("timestamptz"), SqlType::Timestamp);
        assert_eq!(sql_type_from_udt("jsonb"), SqlType::Other(1111));
        assert_eq!(sql_type_from_pg(&Type::NUMERIC), SqlType::Numeric);
    }

    #[test]
    fn test_ddl_types() {
        let id = Column::new("id", SqlType::Integer).primary_key().auto_increment();
        assert_eq!(ddl_type(&id).unwrap(), "SERIAL");
        let title = Column::new("title", SqlType::VarChar).with_precision(255);
        assert_eq!(ddl_type(&title).unwrap(), "VARCHAR(255)");
        let price = Column::new("price", SqlType::Decimal).with_precision(10).with_scale(2);
        assert_eq!(ddl_type(&price).unwrap(), "NUMERIC(10, 2)");
        let flag = Column::new("flag", SqlType::Bit);
        assert_eq!(ddl_type(&flag).unwrap(), "BOOLEAN");
        assert!(ddl_type(&Column::new("x", SqlType::Other(1111))).is_err());
    }

    #[test]
    fn test_param_type_checks() {
        assert!(to_param(&SqlValue::Integer(1), &Type::INT4).is_ok());
        assert!(to_param(&SqlValue::Null, &Type::INT4).is_ok());
        assert!(to_param(&SqlValue::Integer(i64::MAX), &Type::INT4).is_err());
        assert!(to_param(&SqlValue::from("x"), &Type::DATE).is_err());
        assert!(to_param(&SqlValue::from(1), &Type::VARCHAR).is_ok());
        assert!(to_param(&SqlValue::from("x"), &Type::BYTEA).is_err());
    }
}
