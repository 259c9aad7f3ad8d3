//! Database information: the metadata block at the top of a backup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BackupError, Result};

/// Well-known metadata keys.
pub mod keys {
    pub const DATABASE_NAME: &str = "database.name";
    pub const DATABASE_VERSION: &str = "database.version";
    pub const DATABASE_MINOR_VERSION: &str = "database.minorVersion";
    pub const DATABASE_MAJOR_VERSION: &str = "database.majorVersion";
    pub const DRIVER_NAME: &str = "driver.name";
    pub const DRIVER_VERSION: &str = "driver.version";
    pub const SCHEMA_VERSION: &str = "schema-version";
    pub const PLUGIN_NAME: &str = "plugin.name";
    pub const PLUGIN_KEY: &str = "plugin.key";
    pub const PLUGIN_VERSION: &str = "plugin.version";
    pub const PLUGIN_HASH: &str = "plugin.ao.hash";
}

/// Database product family, derived from the reported product name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Hsql,
    MySql,
    Postgres,
    SqlServer,
    Oracle,
    Unknown,
}

impl Vendor {
    /// Detect the vendor from a product name such as `PostgreSQL` or
    /// `Microsoft SQL Server`.
    pub fn from_product_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.starts_with("hsql") {
            Vendor::Hsql
        } else if name.contains("mysql") {
            Vendor::MySql
        } else if name.contains("postgres") {
            Vendor::Postgres
        } else if name.contains("microsoft sql server") || name == "sql server" {
            Vendor::SqlServer
        } else if name.contains("oracle") {
            Vendor::Oracle
        } else {
            Vendor::Unknown
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Vendor::Hsql => "HSQL",
            Vendor::MySql => "MySQL",
            Vendor::Postgres => "PostgreSQL",
            Vendor::SqlServer => "Microsoft SQL Server",
            Vendor::Oracle => "Oracle",
            Vendor::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Key/value metadata about a database, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInformation {
    meta: BTreeMap<String, String>,
}

impl DatabaseInformation {
    pub fn new(meta: BTreeMap<String, String>) -> Self {
        Self { meta }
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    /// Convert a value, falling back to `default` when the key is absent.
    pub fn get_as<T>(&self, key: &str, default: T, convert: impl Fn(&str) -> Option<T>) -> Result<T> {
        match self.meta.get(key) {
            None => Ok(default),
            Some(value) => convert(value).ok_or_else(|| BackupError::InvalidInformation {
                key: key.to_string(),
                value: value.clone(),
            }),
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        self.get_as(key, default, |v| v.trim().parse().ok())
    }

    /// `true` only for a case-insensitive "true"; any other present value is `false`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        self.get_as(key, default, |v| Some(v.trim().eq_ignore_ascii_case("true")))
    }

    /// Vendor of the database this information describes.
    pub fn vendor(&self) -> Vendor {
        self.get(keys::DATABASE_NAME)
            .map(Vendor::from_product_name)
            .unwrap_or(Vendor::Unknown)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.meta.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.meta.len()
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.meta
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DatabaseInformation {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            meta: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_detection() {
        assert_eq!(Vendor::from_product_name("PostgreSQL"), Vendor::Postgres);
        assert_eq!(Vendor::from_product_name("Microsoft SQL Server"), Vendor::SqlServer);
        assert_eq!(Vendor::from_product_name("Oracle"), Vendor::Oracle);
        assert_eq!(Vendor::from_product_name("MySQL"), Vendor::MySql);
        assert_eq!(Vendor::from_product_name("HSQL Database Engine"), Vendor::Hsql);
        assert_eq!(Vendor::from_product_name("H2"), Vendor::Unknown);
    }

    #[test]
    fn test_typed_accessors_with_defaults() {
        let info: DatabaseInformation = [
            (keys::SCHEMA_VERSION, "3"),
            ("flag", "TRUE"),
            ("other", "yes"),
            ("broken", "x1"),
        ]
        .into_iter()
        .collect();

        assert_eq!(info.get_int(keys::SCHEMA_VERSION, -1).unwrap(), 3);
        assert_eq!(info.get_int("absent", -1).unwrap(), -1);
        assert!(info.get_bool("flag", false).unwrap());
        assert!(!info.get_bool("other", true).unwrap());
        assert!(info.get_bool("absent", true).unwrap());
        assert_eq!(info.get_string("absent", "n/a"), "n/a");
        assert!(matches!(
            info.get_int("broken", 0),
            Err(BackupError::InvalidInformation { .. })
        ));
    }

    #[test]
    fn test_vendor_from_information() {
        let info: DatabaseInformation = [(keys::DATABASE_NAME, "PostgreSQL")].into_iter().collect();
        assert_eq!(info.vendor(), Vendor::Postgres);
        assert_eq!(DatabaseInformation::default().vendor(), Vendor::Unknown);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let info: DatabaseInformation = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<_> = info.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
