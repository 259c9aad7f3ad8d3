use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::inserter::{self, Inserter};
use super::{ImportConfiguration, Importer};
use crate::core::{Connection, Context};
use crate::error::{BackupError, Result};
use crate::hooks::AroundImporter;
use crate::node::elements::data;
use crate::node::{check_end_node, check_start_node, is_start, row, NodeParser};
use crate::progress::Task;

/// Loads the run of `data` elements inside one transaction, wrapped by the
/// around hooks.
///
/// Auto-commit is turned off for the load and restored afterwards. With
/// batching on, the inserter also commits every
/// [`BATCH_SIZE`](inserter::BATCH_SIZE) rows, so a failure only rolls back
/// the rows since the last commit.
pub struct DataImporter {
    hooks: Vec<Box<dyn AroundImporter>>,
}

impl DataImporter {
    pub fn new(hooks: Vec<Box<dyn AroundImporter>>) -> Self {
        Self { hooks }
    }

    async fn load_tables(
        &self,
        node: &mut dyn NodeParser,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
    ) -> Result<usize> {
        let mut tables = 0;
        while is_start(node, data::NAME) {
            let table = configuration
                .names
                .table_name(node.required_attribute(data::TABLE_NAME)?);
            let task = Task::TableData(table.clone());
            configuration.monitor.begin(&task);

            let columns = read_columns(node, configuration)?;
            for hook in &self.hooks {
                hook.before_table(conn, configuration, context, &table).await?;
            }

            let rows = load_rows(node, conn, configuration, &table, &columns).await?;
            check_end_node(node, data::NAME)?;

            for hook in self.hooks.iter().rev() {
                hook.after_table(conn, configuration, context, &table).await?;
            }
            info!("Imported {} rows into {}", rows, table);
            configuration.monitor.end(&task);

            node.next_node()?;
            tables += 1;
        }
        Ok(tables)
    }
}

#[async_trait]
impl Importer for DataImporter {
    fn supports(&self, node: &dyn NodeParser) -> bool {
        is_start(node, data::NAME)
    }

    async fn import_node(
        &self,
        node: &mut dyn NodeParser,
        configuration: &ImportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::TablesData);

        let mut conn = configuration.connections.connection().await?;
        let conn = conn.as_mut();

        for hook in &self.hooks {
            hook.before(conn, configuration, context).await?;
        }

        let auto_commit = conn.auto_commit();
        conn.set_auto_commit(false).await?;
        match self.load_tables(node, conn, configuration, context).await {
            Ok(tables) => {
                conn.commit().await?;
                conn.set_auto_commit(auto_commit).await?;
                debug!("Committed data of {} tables", tables);
            }
            Err(e) => {
                if let Err(rollback) = conn.rollback().await {
                    warn!("Rollback after failed import also failed: {}", rollback);
                }
                if let Err(restore) = conn.set_auto_commit(auto_commit).await {
                    warn!("Could not restore auto-commit: {}", restore);
                }
                return Err(e);
            }
        }

        for hook in self.hooks.iter().rev() {
            hook.after(conn, configuration, context).await?;
        }

        monitor.end(&Task::TablesData);
        Ok(())
    }
}

/// Read the `column` declarations of a `data` element, leaving the cursor on
/// the first node after them.
fn read_columns(node: &mut dyn NodeParser, configuration: &ImportConfiguration) -> Result<Vec<String>> {
    check_start_node(node, data::NAME)?;
    let mut columns = Vec::new();
    node.next_node()?;
    while is_start(node, data::COLUMN) {
        columns.push(
            configuration
                .names
                .column_name(node.required_attribute(data::COLUMN_NAME)?),
        );
        node.next_node()?;
        check_end_node(node, data::COLUMN)?;
        node.next_node()?;
    }
    Ok(columns)
}

/// Insert every `row` element, leaving the cursor on the close of `data`.
///
/// The inserter is closed whether or not the rows loaded; the first error
/// wins.
async fn load_rows(
    node: &mut dyn NodeParser,
    conn: &mut dyn Connection,
    configuration: &ImportConfiguration,
    table: &str,
    columns: &[String],
) -> Result<u64> {
    let mut inserter = inserter::create(conn, table, columns, configuration.batch).await?;
    let loaded = insert_rows(node, conn, inserter.as_mut(), configuration, table).await;
    let closed = inserter.close(conn).await;

    match loaded {
        Ok(rows) => {
            sql_context(closed, configuration, table, rows)?;
            Ok(rows)
        }
        Err(e) => {
            if let Err(close) = closed {
                warn!("Closing the inserter for {} also failed: {}", table, close);
            }
            Err(e)
        }
    }
}

async fn insert_rows(
    node: &mut dyn NodeParser,
    conn: &mut dyn Connection,
    inserter: &mut dyn Inserter,
    configuration: &ImportConfiguration,
    table: &str,
) -> Result<u64> {
    let mut rows: u64 = 0;
    while is_start(node, data::ROW) {
        rows += 1;
        node.next_node()?;
        while !node.is_closed() {
            inserter.set_value(row::read(node)?)?;
            node.next_node()?;
        }
        check_end_node(node, data::ROW)?;

        let executed = inserter.execute(conn).await;
        sql_context(executed, configuration, table, rows)?;
        node.next_node()?;
    }
    Ok(rows)
}

/// Report a SQL failure with its table and row, then wrap it.
fn sql_context(
    result: Result<()>,
    configuration: &ImportConfiguration,
    table: &str,
    row: u64,
) -> Result<()> {
    match result {
        Err(e) if e.is_sql() => {
            configuration.monitor.update(&format!(
                "Database error at {}:{} (table:row) of the input: {}",
                table, row, e
            ));
            Err(BackupError::row_import(table, row, e))
        }
        other => other,
    }
}
