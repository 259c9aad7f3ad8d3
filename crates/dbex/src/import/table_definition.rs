use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ImportConfiguration, Importer};
use crate::core::schema::strip_foreign_keys;
use crate::core::{
    Column, Context, DatabaseCleaner, EntityNameProcessor, ForeignKey, SqlType, Table, TableCreator,
};
use crate::error::{BackupError, Result};
use crate::node::elements::{column, foreign_key, table};
use crate::node::{check_end_node, check_start_node, codec, describe, is_start, NodeParser};
use crate::progress::Task;

/// Reads the run of `table` elements, then cleans the target and creates
/// the tables. Foreign keys are left out here and recreated after the data
/// is loaded.
pub struct TableDefinitionImporter {
    cleaner: Arc<dyn DatabaseCleaner>,
    creator: Arc<dyn TableCreator>,
}

impl TableDefinitionImporter {
    pub fn new(cleaner: Arc<dyn DatabaseCleaner>, creator: Arc<dyn TableCreator>) -> Self {
        Self { cleaner, creator }
    }
}

#[async_trait]
impl Importer for TableDefinitionImporter {
    fn supports(&self, node: &dyn NodeParser) -> bool {
        is_start(node, table::NAME)
    }

    async fn import_node(
        &self,
        node: &mut dyn NodeParser,
        configuration: &ImportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::TableDefinition);

        let mut tables = Vec::new();
        while is_start(node, table::NAME) {
            tables.push(read_table(node, configuration.names.as_ref())?);
            node.next_node()?;
        }
        monitor.total_number_of_tables(tables.len());
        monitor.end(&Task::TableDefinition);

        monitor.begin(&Task::TableCreation);
        monitor.update("Creating table definitions...");
        let (stripped, foreign_keys) = strip_foreign_keys(&tables);
        debug!(
            "Creating {} tables, deferring {} foreign keys",
            stripped.len(),
            foreign_keys.len()
        );

        let mut conn = configuration.connections.connection().await?;
        self.cleaner
            .cleanup(conn.as_mut(), configuration.cleanup, &tables)
            .await?;
        self.creator.create(conn.as_mut(), &stripped, monitor).await?;
        monitor.end(&Task::TableCreation);

        context.put_all(tables);
        Ok(())
    }
}

/// Parse one `table` element, leaving the cursor on its close node.
fn read_table(node: &mut dyn NodeParser, names: &dyn EntityNameProcessor) -> Result<Table> {
    check_start_node(node, table::NAME)?;
    let name = names.table_name(node.required_attribute(table::NAME_ATTR)?);

    let mut columns = Vec::new();
    let mut foreign_keys = Vec::new();
    loop {
        node.next_node()?;
        if node.is_closed() {
            check_end_node(node, table::NAME)?;
            break;
        }
        if is_start(node, column::NAME) {
            columns.push(read_column(node, names)?);
        } else if is_start(node, foreign_key::NAME) {
            foreign_keys.push(read_foreign_key(node, names)?);
        } else {
            return Err(BackupError::parse(
                format!("Unexpected {} in table {}", describe(&*node), name),
                node.location(),
            ));
        }
    }

    Ok(Table::new(name, columns, foreign_keys))
}

fn read_column(node: &mut dyn NodeParser, names: &dyn EntityNameProcessor) -> Result<Column> {
    let name = names.column_name(node.required_attribute(column::NAME_ATTR)?);
    let code: i32 = parse_number(node, column::SQL_TYPE, node.required_attribute(column::SQL_TYPE)?)?;

    let mut c = Column::new(name, SqlType::from_code(code));
    if flag(node, column::PRIMARY_KEY) {
        c = c.primary_key();
    }
    if flag(node, column::AUTO_INCREMENT) {
        c = c.auto_increment();
    }
    if let Some(precision) = node.attribute(column::PRECISION) {
        c = c.with_precision(parse_number(node, column::PRECISION, precision)?);
    }
    if let Some(scale) = node.attribute(column::SCALE) {
        c = c.with_scale(parse_number(node, column::SCALE, scale)?);
    }

    node.next_node()?;
    check_end_node(node, column::NAME)?;
    Ok(c)
}

fn read_foreign_key(node: &mut dyn NodeParser, names: &dyn EntityNameProcessor) -> Result<ForeignKey> {
    let fk = ForeignKey::new(
        node.attribute(foreign_key::NAME_ATTR),
        names.table_name(node.required_attribute(foreign_key::FROM_TABLE)?),
        names.column_name(node.required_attribute(foreign_key::FROM_COLUMN)?),
        names.table_name(node.required_attribute(foreign_key::TO_TABLE)?),
        names.column_name(node.required_attribute(foreign_key::TO_COLUMN)?),
    );
    node.next_node()?;
    check_end_node(node, foreign_key::NAME)?;
    Ok(fk)
}

fn flag(node: &dyn NodeParser, key: &str) -> bool {
    node.attribute(key).map(codec::parse_bool).unwrap_or(false)
}

fn parse_number(node: &dyn NodeParser, key: &str, value: &str) -> Result<i32> {
    value.trim().parse().map_err(|_| {
        BackupError::parse(
            format!("Attribute {} of {} is not a number: '{}'", key, describe(node), value),
            node.location(),
        )
    })
}
