//! Core abstractions shared by the export and import pipelines.
//!
//! - [`schema`]: table, column and foreign key definitions
//! - [`value`]: SQL values carried between database and document
//! - [`context`]: typed multimap passed between pipeline stages
//! - [`information`]: database metadata and vendor detection
//! - [`traits`]: connection and DDL collaborators
//! - [`names`]: entity name processing and table selection
//! - [`identifier`]: identifier validation and vendor quoting

pub mod context;
pub mod identifier;
pub mod information;
pub mod names;
pub mod schema;
pub mod traits;
pub mod value;

pub use context::Context;
pub use information::{DatabaseInformation, Vendor};
pub use names::{
    AllTables, CaseNameProcessor, EntityNameProcessor, NameCase, PrefixTableSelector, TableSelector,
};
pub use schema::{Column, ForeignKey, SqlType, Table};
pub use traits::{
    BatchOutcome, CleanupMode, ColumnMetadata, Connection, ConnectionProvider, DatabaseCleaner,
    ForeignKeyCreator, InsertStatement, ResultSet, StatementHandle, TableCreator, TableReader,
};
pub use value::{Row, SqlValue};
