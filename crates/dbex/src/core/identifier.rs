//! Identifier validation and vendor quoting.
//!
//! Table and column names come from backup documents, which are untrusted
//! input, and identifiers cannot be bound as statement parameters. Every name
//! that ends up in generated SQL goes through [`quote`] for the target vendor.

use crate::core::information::Vendor;
use crate::error::{BackupError, Result};

/// Maximum identifier length accepted from a document.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty, overlong and NUL-containing identifiers.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BackupError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(BackupError::Config(format!(
            "Identifier contains a null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BackupError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier for the given vendor.
///
/// SQL Server uses `[name]`, MySQL uses backticks, everything else the
/// standard double quotes. The closing quote character is doubled inside.
pub fn quote(vendor: Vendor, name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(match vendor {
        Vendor::SqlServer => format!("[{}]", name.replace(']', "]]")),
        Vendor::MySql => format!("`{}`", name.replace('`', "``")),
        Vendor::Postgres | Vendor::Oracle | Vendor::Hsql | Vendor::Unknown => {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    })
}

/// Positional parameter placeholder (1-based) for the given vendor.
pub fn placeholder(vendor: Vendor, index: usize) -> String {
    match vendor {
        Vendor::Postgres => format!("${}", index),
        _ => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("ta\0ble").is_err());
        assert!(validate_identifier(&"x".repeat(129)).is_err());
        assert!(validate_identifier(&"x".repeat(128)).is_ok());
    }

    #[test]
    fn test_quote_per_vendor() {
        assert_eq!(quote(Vendor::Postgres, "AO_BOOK").unwrap(), "\"AO_BOOK\"");
        assert_eq!(quote(Vendor::Postgres, "a\"b").unwrap(), "\"a\"\"b\"");
        assert_eq!(quote(Vendor::SqlServer, "a]b").unwrap(), "[a]]b]");
        assert_eq!(quote(Vendor::MySql, "a`b").unwrap(), "`a``b`");
        assert_eq!(quote(Vendor::Oracle, "T").unwrap(), "\"T\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholder(Vendor::Postgres, 3), "$3");
        assert_eq!(placeholder(Vendor::SqlServer, 3), "?");
        assert_eq!(placeholder(Vendor::Unknown, 1), "?");
    }
}
