use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use super::{ExportConfiguration, Exporter};
use crate::core::information::keys;
use crate::core::{ColumnMetadata, Connection, Context, DatabaseInformation, SqlValue};
use crate::error::{BackupError, Result};
use crate::node::elements::data;
use crate::node::row::{self, Leaf};
use crate::node::NodeCreator;
use crate::progress::{ProgressMonitor, Task};

/// Streams the rows of every selected table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataExporter;

impl DataExporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Exporter for DataExporter {
    async fn export(
        &self,
        node: &mut dyn NodeCreator,
        configuration: &ExportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::TablesData);

        let mut conn = configuration.connections.connection().await?;
        let tables: Vec<String> = conn
            .table_names()
            .await?
            .into_iter()
            .filter(|name| configuration.selector.accept(name))
            .collect();

        monitor.update(&format!("Starting export of data for {} tables", tables.len()));

        let mut checker = ConstraintsChecker::default();
        for table in &tables {
            export_table(node, conn.as_mut(), monitor, table, &mut checker).await?;
        }

        monitor.update(&format!("Exported data for {} tables", tables.len()));
        checker.report(monitor, context.get::<DatabaseInformation>());
        monitor.end(&Task::TablesData);
        Ok(())
    }
}

async fn export_table(
    node: &mut dyn NodeCreator,
    conn: &mut dyn Connection,
    monitor: &dyn ProgressMonitor,
    table: &str,
    checker: &mut ConstraintsChecker,
) -> Result<()> {
    let task = Task::TableData(table.to_string());
    monitor.begin(&task);
    monitor.update(&format!("Starting data export for table {}", table));

    let mut result = conn.select_all(table).await?;
    let leaves = result
        .columns
        .iter()
        .map(|c| {
            Leaf::for_type(c.sql_type).ok_or_else(|| BackupError::UnsupportedColumnType {
                type_name: c.type_name.clone(),
                code: c.sql_type.code(),
                table: table.to_string(),
                column: c.name.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    node.add_node(data::NAME)?;
    node.add_attribute(data::TABLE_NAME, table)?;
    for c in &result.columns {
        node.add_node(data::COLUMN)?;
        node.add_attribute(data::COLUMN_NAME, &c.name)?;
        node.close_entity()?;
    }

    let mut rows: u64 = 0;
    while let Some(values) = result.rows.next().await {
        let values = values?;
        rows += 1;
        node.add_node(data::ROW)?;
        for ((value, leaf), metadata) in values.iter().zip(&leaves).zip(&result.columns) {
            checker.check(table, metadata, value, rows);
            row::append(node, *leaf, value)?;
        }
        node.close_entity()?;
    }
    node.close_entity()?;

    debug!("Exported {} rows for table {}", rows, table);
    monitor.update(&format!("Exported {} rows for table {}", rows, table));
    monitor.end(&task);
    Ok(())
}

/// Counts text values longer than their column allows. Such rows export
/// fine but may not restore into a stricter database.
#[derive(Debug, Default)]
struct ConstraintsChecker {
    violations: u64,
}

impl ConstraintsChecker {
    fn check(&mut self, table: &str, column: &ColumnMetadata, value: &SqlValue, row: u64) {
        if let (SqlValue::Text(text), Some(size)) = (value, column.size) {
            let length = text.chars().count();
            if length > size {
                warn!(
                    "Value of {}.{} in row {} is {} characters long, the column allows {}",
                    table, column.name, row, length, size
                );
                self.violations += 1;
            }
        }
    }

    fn report(&self, monitor: &dyn ProgressMonitor, info: Option<&DatabaseInformation>) {
        if self.violations == 0 {
            return;
        }
        let product = info
            .and_then(|i| i.get(keys::DATABASE_NAME))
            .unwrap_or("the current one");
        monitor.update(&format!(
            "Warning: {} database records had constraint violations. This backup may not work if you migrate to a database product other than {}.",
            self.violations, product
        ));
    }
}
