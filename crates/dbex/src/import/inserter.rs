//! Parameterized row insertion, one row at a time or in batches.
//!
//! An inserter is built per table. Values are bound positionally with
//! [`Inserter::set_value`], then [`Inserter::execute`] sends or queues the
//! row and [`Inserter::close`] flushes whatever is left and releases the
//! prepared statement:
//!
//! ```text
//! built -> { bind values -> execute }* -> closed
//! ```
//!
//! # Commits
//!
//! [`BatchInserter`] commits the connection after every [`BATCH_SIZE`] rows.
//! A failure later in the same table does not roll back batches that were
//! already committed. This bounds memory and lock duration for large tables
//! at the cost of strict per-table atomicity.
//!
//! # Truncation
//!
//! Text longer than the target column's reported maximum length is cut to
//! that length, counted in characters. Columns without a reported length
//! are unlimited. Truncation is not reported through the progress monitor.

use async_trait::async_trait;
use tracing::debug;

use super::BatchMode;
use crate::core::{BatchOutcome, Connection, InsertStatement, Row, SqlValue, StatementHandle};
use crate::error::{BackupError, Result};

/// Rows accumulated before a batch is flushed and committed.
pub const BATCH_SIZE: usize = 5000;

#[async_trait]
pub trait Inserter: Send {
    /// Bind the next positional parameter.
    fn set_value(&mut self, value: SqlValue) -> Result<()>;

    /// Send or queue the bound row.
    async fn execute(&mut self, conn: &mut dyn Connection) -> Result<()>;

    /// Flush queued rows and release the statement.
    async fn close(&mut self, conn: &mut dyn Connection) -> Result<()>;
}

/// Prepare an inserter for `columns` of `table`.
///
/// Names must already be mapped to target identifiers.
pub async fn create(
    conn: &mut dyn Connection,
    table: &str,
    columns: &[String],
    mode: BatchMode,
) -> Result<Box<dyn Inserter>> {
    let insert = PreparedInsert::prepare(conn, table, columns).await?;
    Ok(match mode {
        BatchMode::On => Box::new(BatchInserter::new(insert)),
        BatchMode::Off => Box::new(ImmediateInserter::new(insert)),
    })
}

/// Render `INSERT INTO t (c1, c2) VALUES (p1, p2)` for the connection's vendor.
pub fn insert_statement(conn: &dyn Connection, table: &str, columns: &[String]) -> Result<InsertStatement> {
    let quoted = columns
        .iter()
        .map(|c| conn.quote(c))
        .collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| conn.placeholder(i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        conn.quote(table)?,
        quoted.join(", "),
        placeholders.join(", ")
    );
    Ok(InsertStatement {
        table: table.to_string(),
        columns: columns.to_vec(),
        sql,
    })
}

/// State shared by both inserters: the statement, the maximum text length
/// of each column and the row being bound.
struct PreparedInsert {
    table: String,
    statement: StatementHandle,
    sizes: Vec<Option<usize>>,
    row: Row,
}

impl PreparedInsert {
    async fn prepare(conn: &mut dyn Connection, table: &str, columns: &[String]) -> Result<Self> {
        let metadata = conn.columns(table).await?;
        let sizes = columns
            .iter()
            .map(|name| {
                metadata
                    .iter()
                    .find(|m| m.name.eq_ignore_ascii_case(name))
                    .and_then(|m| m.size)
            })
            .collect();

        let insert = insert_statement(conn, table, columns)?;
        debug!("Prepared insert for {}: {}", table, insert.sql);
        let statement = conn.prepare(&insert).await?;

        Ok(Self {
            table: table.to_string(),
            statement,
            sizes,
            row: Vec::with_capacity(columns.len()),
        })
    }

    fn bind(&mut self, value: SqlValue) -> Result<()> {
        let index = self.row.len();
        let size = *self.sizes.get(index).ok_or_else(|| {
            BackupError::IllegalState(format!(
                "Row for table {} has more than {} values",
                self.table,
                self.sizes.len()
            ))
        })?;
        self.row.push(truncate(value, size));
        Ok(())
    }

    fn take_row(&mut self) -> Result<Row> {
        if self.row.len() != self.sizes.len() {
            return Err(BackupError::IllegalState(format!(
                "Row for table {} has {} values, expected {}",
                self.table,
                self.row.len(),
                self.sizes.len()
            )));
        }
        Ok(std::mem::replace(&mut self.row, Vec::with_capacity(self.sizes.len())))
    }
}

fn truncate(value: SqlValue, size: Option<usize>) -> SqlValue {
    match (value, size) {
        (SqlValue::Text(text), Some(max)) if text.chars().count() > max => {
            SqlValue::Text(text.chars().take(max).collect())
        }
        (value, _) => value,
    }
}

/// Executes every row as soon as it is bound.
pub struct ImmediateInserter {
    insert: PreparedInsert,
}

impl ImmediateInserter {
    fn new(insert: PreparedInsert) -> Self {
        Self { insert }
    }
}

#[async_trait]
impl Inserter for ImmediateInserter {
    fn set_value(&mut self, value: SqlValue) -> Result<()> {
        self.insert.bind(value)
    }

    async fn execute(&mut self, conn: &mut dyn Connection) -> Result<()> {
        let row = self.insert.take_row()?;
        conn.execute_prepared(self.insert.statement, &row).await?;
        Ok(())
    }

    async fn close(&mut self, conn: &mut dyn Connection) -> Result<()> {
        conn.close_statement(self.insert.statement).await
    }
}

/// Queues rows and flushes them every [`BATCH_SIZE`] rows.
pub struct BatchInserter {
    insert: PreparedInsert,
    batch: Vec<Row>,
}

impl BatchInserter {
    fn new(insert: PreparedInsert) -> Self {
        Self {
            insert,
            batch: Vec::new(),
        }
    }

    async fn flush(&mut self, conn: &mut dyn Connection) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.batch);
        let outcomes = conn.execute_batch(self.insert.statement, &rows).await?;
        let failure = outcomes.into_iter().find_map(|outcome| match outcome {
            BatchOutcome::Failed(e) => Some(e),
            BatchOutcome::Success(_) => None,
        });
        if let Some(e) = failure {
            return Err(BackupError::batch_insert(e));
        }
        debug!("Flushed {} rows into {}", rows.len(), self.insert.table);
        Ok(())
    }
}

#[async_trait]
impl Inserter for BatchInserter {
    fn set_value(&mut self, value: SqlValue) -> Result<()> {
        self.insert.bind(value)
    }

    async fn execute(&mut self, conn: &mut dyn Connection) -> Result<()> {
        let row = self.insert.take_row()?;
        self.batch.push(row);
        if self.batch.len() >= BATCH_SIZE {
            self.flush(conn).await?;
            conn.commit().await?;
        }
        Ok(())
    }

    async fn close(&mut self, conn: &mut dyn Connection) -> Result<()> {
        self.flush(conn).await?;
        conn.close_statement(self.insert.statement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(
            truncate(SqlValue::from("héllo"), Some(4)),
            SqlValue::from("héll")
        );
        assert_eq!(truncate(SqlValue::from("abc"), Some(3)), SqlValue::from("abc"));
        assert_eq!(truncate(SqlValue::from("abc"), None), SqlValue::from("abc"));
        assert_eq!(truncate(SqlValue::Integer(12345), Some(2)), SqlValue::Integer(12345));
        assert_eq!(truncate(SqlValue::Null, Some(0)), SqlValue::Null);
    }
}
