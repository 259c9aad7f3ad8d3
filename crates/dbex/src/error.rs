//! Error types for the backup library.

use thiserror::Error;

/// Main error type for backup and restore operations.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database driver error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// SQL failure raised outside the driver
    #[error("SQL error: {0}")]
    Sql(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// SQL failure while inserting a specific row
    #[error("There has been a SQL exception importing row #{row} for table '{table}' see the cause for more details")]
    RowImport {
        table: String,
        row: u64,
        #[source]
        source: Box<BackupError>,
    },

    /// A batch contained at least one failed row
    #[error("SQL batch insert failed.")]
    BatchInsert {
        #[source]
        source: Box<BackupError>,
    },

    /// Malformed document structure
    #[error("{message} Location: {location}")]
    Parse { message: String, location: String },

    /// Low level XML read or write failure
    #[error("XML error: {0}")]
    Xml(String),

    /// The backup cannot be restored by this version
    #[error("{0}")]
    Incompatible(String),

    /// A row contained a typed leaf this importer does not know
    #[error("Unsupported field encountered: {0}")]
    UnsupportedField(String),

    /// A column type the exporter cannot encode
    #[error("Cannot encode value for unsupported column type: \"{type_name}\" ({code}) of column {table}.{column}")]
    UnsupportedColumnType {
        type_name: String,
        code: i32,
        table: String,
        column: String,
    },

    /// A database information entry failed typed conversion
    #[error("Invalid value '{value}' for database information key '{key}'")]
    InvalidInformation { key: String, value: String },

    /// A cursor or writer was used out of protocol
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackupError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        BackupError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Parse error at the given document location
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        BackupError::Parse {
            message: message.into(),
            location: location.into(),
        }
    }

    /// Wrap an error raised while importing a row
    pub fn row_import(table: impl Into<String>, row: u64, source: BackupError) -> Self {
        BackupError::RowImport {
            table: table.into(),
            row,
            source: Box::new(source),
        }
    }

    /// Wrap the first row failure reported by a batch
    pub fn batch_insert(source: BackupError) -> Self {
        BackupError::BatchInsert {
            source: Box::new(source),
        }
    }

    /// True for SQL-level failures, wherever they were raised.
    pub fn is_sql(&self) -> bool {
        matches!(
            self,
            BackupError::Database(_)
                | BackupError::Sql(_)
                | BackupError::BatchInsert { .. }
                | BackupError::RowImport { .. }
        )
    }

    /// True when a DROP failed only because the object was already gone.
    pub fn is_missing_object(&self) -> bool {
        let message = match self {
            BackupError::Database(e) => match e.as_db_error() {
                Some(db) => db.message().to_string(),
                None => e.to_string(),
            },
            BackupError::Sql(message) => message.clone(),
            _ => return false,
        };
        message.contains("does not exist")
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            BackupError::Config(_) | BackupError::Yaml(_) | BackupError::Json(_) => 1,
            BackupError::Database(_)
            | BackupError::Sql(_)
            | BackupError::Pool { .. }
            | BackupError::BatchInsert { .. }
            | BackupError::RowImport { .. } => 2,
            BackupError::Parse { .. } | BackupError::Xml(_) => 3,
            BackupError::Incompatible(_) => 4,
            BackupError::UnsupportedField(_)
            | BackupError::UnsupportedColumnType { .. }
            | BackupError::InvalidInformation { .. } => 5,
            BackupError::IllegalState(_) => 6,
            BackupError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_import_message_and_chain() {
        let err = BackupError::row_import("BOOK", 7, BackupError::Sql("duplicate key".into()));
        assert_eq!(
            err.to_string(),
            "There has been a SQL exception importing row #7 for table 'BOOK' see the cause for more details"
        );
        let detailed = err.format_detailed();
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("duplicate key"));
        assert!(err.is_sql());
    }

    #[test]
    fn test_batch_insert_keeps_driver_error() {
        let err = BackupError::batch_insert(BackupError::Sql("value 2 rejected".into()));
        assert_eq!(err.to_string(), "SQL batch insert failed.");
        assert!(err.is_sql());
        assert_eq!(err.exit_code(), 2);
        assert!(err.format_detailed().contains("value 2 rejected"));
    }

    #[test]
    fn test_missing_object_detection() {
        assert!(BackupError::Sql("table \"x\" does not exist".into()).is_missing_object());
        assert!(!BackupError::Sql("permission denied".into()).is_missing_object());
        assert!(!BackupError::Config("does not exist".into()).is_missing_object());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BackupError::Config("x".into()).exit_code(), 1);
        assert_eq!(BackupError::Sql("x".into()).exit_code(), 2);
        assert_eq!(BackupError::parse("bad", "byte 3").exit_code(), 3);
        assert_eq!(BackupError::Incompatible("x".into()).exit_code(), 4);
        assert_eq!(BackupError::UnsupportedField("blob".into()).exit_code(), 5);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(BackupError::from(io).exit_code(), 7);
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = BackupError::parse("Unexpected text.", "byte 42");
        assert_eq!(err.to_string(), "Unexpected text. Location: byte 42");
    }
}
