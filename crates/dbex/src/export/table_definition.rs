use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ExportConfiguration, Exporter};
use crate::core::{Context, Table, TableReader};
use crate::error::Result;
use crate::node::elements::{column, foreign_key, table};
use crate::node::{codec, NodeCreator};
use crate::progress::Task;

/// Writes one `table` element per selected table.
pub struct TableDefinitionExporter {
    reader: Arc<dyn TableReader>,
}

impl TableDefinitionExporter {
    pub fn new(reader: Arc<dyn TableReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Exporter for TableDefinitionExporter {
    async fn export(
        &self,
        node: &mut dyn NodeCreator,
        configuration: &ExportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::TableDefinition);

        let mut conn = configuration.connections.connection().await?;
        let tables: Vec<Table> = self
            .reader
            .read(conn.as_mut())
            .await?
            .into_iter()
            .filter(|t| configuration.selector.accept(&t.name))
            .collect();
        monitor.total_number_of_tables(tables.len());

        for t in &tables {
            debug!("Exporting definition of table {}", t.name);
            write_table(node, t)?;
        }

        context.put_all(tables);
        monitor.end(&Task::TableDefinition);
        Ok(())
    }
}

fn write_table(node: &mut dyn NodeCreator, t: &Table) -> Result<()> {
    node.add_node(table::NAME)?;
    node.add_attribute(table::NAME_ATTR, &t.name)?;

    for c in &t.columns {
        node.add_node(column::NAME)?;
        node.add_attribute(column::NAME_ATTR, &c.name)?;
        node.add_attribute(column::PRIMARY_KEY, codec::format_bool(c.primary_key))?;
        node.add_attribute(column::AUTO_INCREMENT, codec::format_bool(c.auto_increment))?;
        node.add_attribute(column::SQL_TYPE, &c.sql_type.code().to_string())?;
        if let Some(precision) = c.precision {
            node.add_attribute(column::PRECISION, &precision.to_string())?;
        }
        if let Some(scale) = c.scale {
            node.add_attribute(column::SCALE, &scale.to_string())?;
        }
        node.close_entity()?;
    }

    for fk in &t.foreign_keys {
        node.add_node(foreign_key::NAME)?;
        node.add_attribute(foreign_key::NAME_ATTR, &fk.name)?;
        node.add_attribute(foreign_key::FROM_TABLE, &fk.from_table)?;
        node.add_attribute(foreign_key::FROM_COLUMN, &fk.from_column)?;
        node.add_attribute(foreign_key::TO_TABLE, &fk.to_table)?;
        node.add_attribute(foreign_key::TO_COLUMN, &fk.to_column)?;
        node.close_entity()?;
    }

    node.close_entity()
}
