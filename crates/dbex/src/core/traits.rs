//! Collaborator traits the pipelines are written against.
//!
//! The export and import pipelines never talk to a database driver directly.
//! They go through these traits, which are implemented by the drivers in
//! [`crate::drivers`]:
//!
//! - [`Connection`]: one live session, used for a whole pipeline stage
//! - [`ConnectionProvider`]: hands out connections
//! - [`TableReader`]: schema introspection for export
//! - [`TableCreator`], [`DatabaseCleaner`], [`ForeignKeyCreator`]: DDL for import

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::core::identifier;
use crate::core::information::{DatabaseInformation, Vendor};
use crate::core::schema::{ForeignKey, SqlType, Table};
use crate::core::value::{Row, SqlValue};
use crate::error::{BackupError, Result};
use crate::progress::ProgressMonitor;

/// Column metadata reported by a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name as stored in the database.
    pub name: String,

    /// Vendor-neutral type.
    pub sql_type: SqlType,

    /// Native type name, for diagnostics.
    pub type_name: String,

    /// Maximum character length, or `None` when the database does not say.
    pub size: Option<usize>,
}

/// Rows of one query, fetched lazily.
pub struct ResultSet {
    /// Columns in result order.
    pub columns: Vec<ColumnMetadata>,

    /// One item per row; no more than one row is materialized at a time.
    pub rows: BoxStream<'static, Result<Row>>,
}

/// An INSERT prepared by the batched inserter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    /// Target table, already name-processed.
    pub table: String,

    /// Target columns in placeholder order.
    pub columns: Vec<String>,

    /// Rendered SQL with one placeholder per column.
    pub sql: String,
}

/// Opaque handle to a prepared statement owned by a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementHandle(pub u64);

/// Result of one row in a batch execution.
#[derive(Debug)]
pub enum BatchOutcome {
    /// Row executed, with the number of affected rows.
    Success(u64),
    /// Row failed with the driver's error.
    Failed(BackupError),
}

/// A live database session.
///
/// Statements run in auto-commit mode until [`set_auto_commit`](Self::set_auto_commit)
/// turns it off, after which work accumulates until [`commit`](Self::commit).
#[async_trait]
pub trait Connection: Send {
    /// Vendor of the connected database.
    fn vendor(&self) -> Vendor;

    /// Quote an identifier for this database.
    fn quote(&self, name: &str) -> Result<String> {
        identifier::quote(self.vendor(), name)
    }

    /// Positional parameter placeholder, 1-based.
    fn placeholder(&self, index: usize) -> String {
        identifier::placeholder(self.vendor(), index)
    }

    /// Product and driver metadata (`database.*` and `driver.*` keys).
    async fn information(&mut self) -> Result<DatabaseInformation>;

    /// Names of the tables visible to this session.
    async fn table_names(&mut self) -> Result<Vec<String>>;

    /// Column metadata of a table, in table order. Unknown tables yield an empty list.
    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetadata>>;

    /// Stream every row of a table.
    async fn select_all(&mut self, table: &str) -> Result<ResultSet>;

    /// Run a statement without results, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// First column of the first row; `None` when the query returns no rows.
    async fn query_scalar(&mut self, sql: &str) -> Result<Option<SqlValue>>;

    /// Prepare an INSERT for repeated execution.
    async fn prepare(&mut self, insert: &InsertStatement) -> Result<StatementHandle>;

    /// Execute a prepared statement once.
    async fn execute_prepared(&mut self, statement: StatementHandle, params: &[SqlValue]) -> Result<u64>;

    /// Execute a prepared statement once per row, reporting each row's outcome.
    async fn execute_batch(&mut self, statement: StatementHandle, rows: &[Row]) -> Result<Vec<BatchOutcome>>;

    /// Release a prepared statement.
    async fn close_statement(&mut self, statement: StatementHandle) -> Result<()>;

    fn auto_commit(&self) -> bool;

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    /// Discard work since the last commit.
    async fn rollback(&mut self) -> Result<()>;
}

/// Supplies one connection per pipeline stage.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn connection(&self) -> Result<Box<dyn Connection>>;
}

/// Reads table definitions from a live database.
#[async_trait]
pub trait TableReader: Send + Sync {
    async fn read(&self, conn: &mut dyn Connection) -> Result<Vec<Table>>;
}

/// Renders and executes DDL for parsed tables.
///
/// Tables arrive with names already mapped by the entity name processor and
/// without foreign keys; those are created after the data is loaded.
#[async_trait]
pub trait TableCreator: Send + Sync {
    async fn create(
        &self,
        conn: &mut dyn Connection,
        tables: &[Table],
        monitor: &dyn ProgressMonitor,
    ) -> Result<()>;
}

/// Whether pre-existing tables are dropped before a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    #[default]
    Clean,
    None,
}

/// Drops objects that would collide with a restore.
#[async_trait]
pub trait DatabaseCleaner: Send + Sync {
    async fn cleanup(&self, conn: &mut dyn Connection, mode: CleanupMode, tables: &[Table]) -> Result<()>;
}

/// Creates foreign key constraints.
#[async_trait]
pub trait ForeignKeyCreator: Send + Sync {
    async fn create(&self, conn: &mut dyn Connection, foreign_keys: &[ForeignKey]) -> Result<()>;
}
