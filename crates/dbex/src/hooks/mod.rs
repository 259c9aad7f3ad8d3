//! Around hooks wrapping the data import.
//!
//! Hooks are independent strategies composed by an ordered list. The data
//! importer runs every `before` in list order, then per table the
//! `before_table` callbacks in list order and the `after_table` callbacks in
//! reverse, and finally every `after` in reverse list order. A hook
//! registered later therefore wraps the hooks registered before it.
//!
//! Vendor hooks check the target vendor from
//! [`ImportConfiguration::target`] and do nothing on other databases.

mod foreign_keys;
mod oracle;
mod postgres;
mod sql_server;

pub use foreign_keys::ForeignKeyHook;
pub use oracle::OracleSequencesHook;
pub use postgres::PostgresSequencesHook;
pub use sql_server::SqlServerIdentityHook;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Connection, Context, ForeignKeyCreator, SqlValue, Table};
use crate::error::{BackupError, Result};
use crate::import::ImportConfiguration;

#[async_trait]
pub trait AroundImporter: Send + Sync {
    /// Runs once before any table is loaded, with auto-commit still on.
    async fn before(
        &self,
        _conn: &mut dyn Connection,
        _configuration: &ImportConfiguration,
        _context: &Context,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs once after all tables are loaded and committed.
    async fn after(
        &self,
        _conn: &mut dyn Connection,
        _configuration: &ImportConfiguration,
        _context: &Context,
    ) -> Result<()> {
        Ok(())
    }

    async fn before_table(
        &self,
        _conn: &mut dyn Connection,
        _configuration: &ImportConfiguration,
        _context: &Context,
        _table: &str,
    ) -> Result<()> {
        Ok(())
    }

    async fn after_table(
        &self,
        _conn: &mut dyn Connection,
        _configuration: &ImportConfiguration,
        _context: &Context,
        _table: &str,
    ) -> Result<()> {
        Ok(())
    }
}

/// The vendor hooks in their standard order, foreign keys outermost.
pub fn default_hooks(foreign_keys: Arc<dyn ForeignKeyCreator>) -> Vec<Box<dyn AroundImporter>> {
    vec![
        Box::new(SqlServerIdentityHook),
        Box::new(PostgresSequencesHook),
        Box::new(OracleSequencesHook),
        Box::new(ForeignKeyHook::new(foreign_keys)),
    ]
}

/// Tables parsed by the definition stage.
fn tables(context: &Context) -> Vec<&Table> {
    context.get_all::<Table>()
}

/// Next value for a sequence backing `column`: `MAX(column) + 1`, or 1 for
/// an empty table.
async fn next_value(conn: &mut dyn Connection, table: &str, column: &str) -> Result<i64> {
    let sql = format!("SELECT MAX({}) FROM {}", conn.quote(column)?, conn.quote(table)?);
    let max = match conn.query_scalar(&sql).await? {
        None | Some(SqlValue::Null) => 0,
        Some(value) => value.as_i64().ok_or_else(|| {
            BackupError::Sql(format!(
                "MAX({}) of table {} is not a number: {}",
                column,
                table,
                value.kind()
            ))
        })?,
    };
    max.checked_add(1).ok_or_else(|| {
        BackupError::Sql(format!(
            "MAX({}) of table {} is {}, no sequence value can follow it",
            column, table, max
        ))
    })
}
