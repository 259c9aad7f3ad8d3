//! In-memory database implementing every collaborator.
//!
//! Used by the test suites and for dry runs. Tables hold rows in column
//! order; writes made with auto-commit off stay private to the connection
//! until [`Connection::commit`]. Every statement, commit and batch is
//! recorded so callers can assert on what a pipeline did.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::core::information::keys;
use crate::core::{
    BatchOutcome, CleanupMode, Column, ColumnMetadata, Connection, ConnectionProvider, DatabaseCleaner,
    DatabaseInformation, ForeignKey, ForeignKeyCreator, InsertStatement, ResultSet, Row, SqlValue,
    StatementHandle, Table, TableCreator, TableReader, Vendor,
};
use crate::error::{BackupError, Result};
use crate::progress::ProgressMonitor;

/// Product name reported when none is given.
pub const DEFAULT_PRODUCT: &str = "HSQL Database Engine";

#[derive(Debug, Clone)]
struct StoredTable {
    table: Table,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct State {
    product: String,
    tables: Vec<StoredTable>,
    statements: Vec<String>,
    commits: usize,
    batches: Vec<usize>,
    scalars: HashMap<String, SqlValue>,
    rejected: Vec<SqlValue>,
    failing_sql: Vec<String>,
    next_statement: u64,
    open_statements: usize,
}

impl State {
    fn table(&self, name: &str) -> Option<&StoredTable> {
        self.tables.iter().find(|t| t.table.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut StoredTable> {
        self.tables
            .iter_mut()
            .find(|t| t.table.name == name)
            .ok_or_else(|| missing_relation(name))
    }

    fn record(&mut self, sql: &str) -> Result<()> {
        self.statements.push(sql.to_string());
        if let Some(pattern) = self.failing_sql.iter().find(|p| sql.contains(p.as_str())) {
            return Err(BackupError::Sql(format!(
                "statement rejected ({}): {}",
                pattern, sql
            )));
        }
        Ok(())
    }
}

fn missing_relation(name: &str) -> BackupError {
    BackupError::Sql(format!("relation \"{}\" does not exist", name))
}

/// Shared handle to an in-memory database. Clones see the same data.
#[derive(Debug, Clone)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new(DEFAULT_PRODUCT)
    }
}

impl MemoryDatabase {
    /// Create an empty database reporting `product` as its product name,
    /// which decides the vendor the hooks see.
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                product: product.into(),
                ..State::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a table with committed rows, replacing any table of the same name.
    pub fn insert_table(&self, table: Table, rows: Vec<Row>) {
        let mut state = self.state();
        state.tables.retain(|t| t.table.name != table.name);
        state.tables.push(StoredTable { table, rows });
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.state().table(name).map(|t| t.table.clone())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.iter().map(|t| t.table.name.clone()).collect()
    }

    /// Committed rows of a table; empty for unknown tables.
    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.state().table(name).map(|t| t.rows.clone()).unwrap_or_default()
    }

    /// Every statement executed so far, DDL and hooks included.
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    /// Prepared statements not yet closed, across all connections.
    pub fn open_statements(&self) -> usize {
        self.state().open_statements
    }

    /// Row count of every executed batch, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batches.clone()
    }

    /// Result returned by `query_scalar` for exactly this SQL.
    pub fn set_scalar(&self, sql: impl Into<String>, value: SqlValue) {
        self.state().scalars.insert(sql.into(), value);
    }

    /// Make every insert of a row containing `value` fail.
    pub fn reject_value(&self, value: SqlValue) {
        self.state().rejected.push(value);
    }

    /// Make every statement containing `pattern` fail.
    pub fn fail_statements_containing(&self, pattern: impl Into<String>) {
        self.state().failing_sql.push(pattern.into());
    }
}

#[async_trait]
impl ConnectionProvider for MemoryDatabase {
    async fn connection(&self) -> Result<Box<dyn Connection>> {
        let vendor = Vendor::from_product_name(&self.state().product);
        Ok(Box::new(MemoryConnection {
            database: self.clone(),
            vendor,
            auto_commit: true,
            pending: Vec::new(),
            prepared: HashMap::new(),
        }))
    }
}

/// Prepared insert: target table plus the table position of each parameter.
struct Prepared {
    table: String,
    positions: Vec<usize>,
    width: usize,
}

/// One session on a [`MemoryDatabase`].
pub struct MemoryConnection {
    database: MemoryDatabase,
    vendor: Vendor,
    auto_commit: bool,
    /// Rows written since the last commit, when auto-commit is off.
    pending: Vec<(String, Row)>,
    prepared: HashMap<u64, Prepared>,
}

impl MemoryConnection {
    fn apply_pending(&mut self) -> Result<()> {
        let mut state = self.database.state();
        for (table, row) in self.pending.drain(..) {
            state.table_mut(&table)?.rows.push(row);
        }
        Ok(())
    }

    fn insert(&mut self, statement: StatementHandle, params: &[SqlValue]) -> Result<()> {
        let prepared = self.prepared.get(&statement.0).ok_or_else(|| {
            BackupError::IllegalState(format!("Unknown prepared statement {}", statement.0))
        })?;
        if params.len() != prepared.positions.len() {
            return Err(BackupError::Sql(format!(
                "expected {} parameters, got {}",
                prepared.positions.len(),
                params.len()
            )));
        }

        let mut state = self.database.state();
        if let Some(value) = params.iter().find(|v| state.rejected.contains(*v)) {
            return Err(BackupError::Sql(format!(
                "value {:?} rejected by table {}",
                value, prepared.table
            )));
        }

        let mut row = vec![SqlValue::Null; prepared.width];
        for (position, value) in prepared.positions.iter().zip(params) {
            row[*position] = value.clone();
        }
        if self.auto_commit {
            state.table_mut(&prepared.table)?.rows.push(row);
        } else {
            self.pending.push((prepared.table.clone(), row));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn information(&mut self) -> Result<DatabaseInformation> {
        let product = self.database.state().product.clone();
        Ok([
            (keys::DATABASE_NAME, product.as_str()),
            (keys::DATABASE_VERSION, "1.0"),
            (keys::DATABASE_MAJOR_VERSION, "1"),
            (keys::DATABASE_MINOR_VERSION, "0"),
            (keys::DRIVER_NAME, "dbex memory"),
            (keys::DRIVER_VERSION, env!("CARGO_PKG_VERSION")),
        ]
        .into_iter()
        .collect())
    }

    async fn table_names(&mut self) -> Result<Vec<String>> {
        Ok(self.database.table_names())
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let state = self.database.state();
        Ok(state
            .table(table)
            .map(|t| t.table.columns.iter().map(metadata).collect())
            .unwrap_or_default())
    }

    async fn select_all(&mut self, table: &str) -> Result<ResultSet> {
        let state = self.database.state();
        let stored = state.table(table).ok_or_else(|| missing_relation(table))?;
        let columns = stored.table.columns.iter().map(metadata).collect();
        let rows = stored.rows.clone();
        Ok(ResultSet {
            columns,
            rows: stream::iter(rows.into_iter().map(Ok)).boxed(),
        })
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.database.state().record(sql)?;
        Ok(0)
    }

    async fn query_scalar(&mut self, sql: &str) -> Result<Option<SqlValue>> {
        let mut state = self.database.state();
        state.record(sql)?;
        Ok(state.scalars.get(sql).cloned())
    }

    async fn prepare(&mut self, insert: &InsertStatement) -> Result<StatementHandle> {
        let mut state = self.database.state();
        state.record(&insert.sql)?;
        let stored = state.table(&insert.table).ok_or_else(|| missing_relation(&insert.table))?;
        let positions = insert
            .columns
            .iter()
            .map(|name| {
                stored
                    .table
                    .columns
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| {
                        BackupError::Sql(format!(
                            "column \"{}\" of relation \"{}\" does not exist",
                            name, insert.table
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let width = stored.table.columns.len();

        state.next_statement += 1;
        state.open_statements += 1;
        let handle = state.next_statement;
        drop(state);

        self.prepared.insert(
            handle,
            Prepared {
                table: insert.table.clone(),
                positions,
                width,
            },
        );
        Ok(StatementHandle(handle))
    }

    async fn execute_prepared(&mut self, statement: StatementHandle, params: &[SqlValue]) -> Result<u64> {
        self.insert(statement, params)?;
        Ok(1)
    }

    async fn execute_batch(&mut self, statement: StatementHandle, rows: &[Row]) -> Result<Vec<BatchOutcome>> {
        self.database.state().batches.push(rows.len());
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            outcomes.push(match self.insert(statement, row) {
                Ok(()) => BatchOutcome::Success(1),
                Err(e) if e.is_sql() => BatchOutcome::Failed(e),
                Err(e) => return Err(e),
            });
        }
        Ok(outcomes)
    }

    async fn close_statement(&mut self, statement: StatementHandle) -> Result<()> {
        if self.prepared.remove(&statement.0).is_some() {
            self.database.state().open_statements -= 1;
        }
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit && !self.auto_commit {
            self.apply_pending()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.apply_pending()?;
        self.database.state().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

fn metadata(column: &Column) -> ColumnMetadata {
    let size = if column.sql_type.is_text() {
        column.precision.filter(|p| *p > 0).map(|p| p as usize)
    } else {
        None
    };
    ColumnMetadata {
        name: column.name.clone(),
        sql_type: column.sql_type,
        type_name: column.sql_type.name(),
        size,
    }
}

#[async_trait]
impl TableReader for MemoryDatabase {
    async fn read(&self, _conn: &mut dyn Connection) -> Result<Vec<Table>> {
        Ok(self.state().tables.iter().map(|t| t.table.clone()).collect())
    }
}

#[async_trait]
impl TableCreator for MemoryDatabase {
    async fn create(
        &self,
        _conn: &mut dyn Connection,
        tables: &[Table],
        monitor: &dyn ProgressMonitor,
    ) -> Result<()> {
        let mut state = self.state();
        for table in tables {
            monitor.update(&format!("Creating table {}", table.name));
            state.record(&format!("CREATE TABLE {}", table.name))?;
            if state.table(&table.name).is_some() {
                return Err(BackupError::Sql(format!(
                    "relation \"{}\" already exists",
                    table.name
                )));
            }
            state.tables.push(StoredTable {
                table: table.clone(),
                rows: Vec::new(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseCleaner for MemoryDatabase {
    async fn cleanup(&self, _conn: &mut dyn Connection, mode: CleanupMode, tables: &[Table]) -> Result<()> {
        if mode == CleanupMode::None {
            return Ok(());
        }
        let mut state = self.state();
        for table in tables {
            state.record(&format!("DROP TABLE {}", table.name))?;
            state.tables.retain(|t| t.table.name != table.name);
        }
        Ok(())
    }
}

#[async_trait]
impl ForeignKeyCreator for MemoryDatabase {
    async fn create(&self, _conn: &mut dyn Connection, foreign_keys: &[ForeignKey]) -> Result<()> {
        let mut state = self.state();
        for fk in foreign_keys {
            state.record(&format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
                fk.from_table, fk.name, fk.from_column, fk.to_table, fk.to_column
            ))?;
            if state.table(&fk.to_table).is_none() {
                return Err(missing_relation(&fk.to_table));
            }
            state.table_mut(&fk.from_table)?.table.foreign_keys.push(fk.clone());
        }
        Ok(())
    }
}
