//! Backup facade: the default export and import pipelines wired to one
//! database.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::{BackupConfig, Config};
use crate::core::{
    AllTables, CaseNameProcessor, ConnectionProvider, Context, DatabaseCleaner, EntityNameProcessor,
    ForeignKeyCreator, PrefixTableSelector, TableCreator, TableReader, TableSelector,
};
use crate::drivers::PostgresDatabase;
use crate::error::{BackupError, Result};
use crate::export::{
    ConnectionInformationReader, DataExporter, DatabaseInformationExporter, DbExporter,
    ExportConfiguration, Exporter, StaticInformationReader, TableDefinitionExporter,
};
use crate::hooks::default_hooks;
use crate::import::{
    read_meta, DataImporter, DatabaseInformationImporter, DbImporter, ImportConfiguration, Importer,
    SchemaVersionChecker, TableDefinitionImporter,
};
use crate::node::elements::{self, data, database, table};
use crate::node::{check_end_node, check_start_node, NodeParser, XmlNodeReader, XmlNodeWriter};
use crate::progress::{LogProgressMonitor, ProgressMonitor};

/// Saves a database into a backup document and restores it from one.
pub struct Backup {
    connections: Arc<dyn ConnectionProvider>,
    table_reader: Arc<dyn TableReader>,
    table_creator: Arc<dyn TableCreator>,
    cleaner: Arc<dyn DatabaseCleaner>,
    foreign_keys: Arc<dyn ForeignKeyCreator>,
    monitor: Arc<dyn ProgressMonitor>,
    options: BackupConfig,
}

impl Backup {
    /// Use `database` for every collaborator.
    pub fn new<D>(database: D, options: BackupConfig) -> Self
    where
        D: ConnectionProvider + TableReader + TableCreator + DatabaseCleaner + ForeignKeyCreator + 'static,
    {
        let database = Arc::new(database);
        Self {
            connections: database.clone(),
            table_reader: database.clone(),
            table_creator: database.clone(),
            cleaner: database.clone(),
            foreign_keys: database,
            monitor: Arc::new(LogProgressMonitor),
            options,
        }
    }

    /// Connect to the PostgreSQL database named in the configuration.
    pub async fn connect(config: &Config) -> Result<Self> {
        let database = PostgresDatabase::connect(&config.database).await?;
        Ok(Self::new(database, config.backup.clone()))
    }

    pub fn with_monitor(mut self, monitor: Arc<dyn ProgressMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn options(&self) -> &BackupConfig {
        &self.options
    }

    fn names(&self) -> Arc<dyn EntityNameProcessor> {
        Arc::new(CaseNameProcessor::new(self.options.name_case))
    }

    fn selector(&self) -> Arc<dyn TableSelector> {
        match &self.options.table_prefix {
            Some(prefix) => Arc::new(PrefixTableSelector::new(prefix.clone())),
            None => Arc::new(AllTables),
        }
    }

    /// Write the selected tables with their data to `output`.
    pub async fn save<W: Write + Send>(&self, output: W) -> Result<Context> {
        let started = Instant::now();
        let exporters: Vec<Box<dyn Exporter>> = vec![
            Box::new(DatabaseInformationExporter::new(vec![
                Box::new(ConnectionInformationReader),
                Box::new(StaticInformationReader::new(self.options.metadata())),
            ])),
            Box::new(TableDefinitionExporter::new(self.table_reader.clone())),
            Box::new(DataExporter::new()),
        ];
        let configuration = ExportConfiguration {
            connections: self.connections.clone(),
            monitor: self.monitor.clone(),
            selector: self.selector(),
        };

        let mut writer = XmlNodeWriter::new(output, self.options.namespace.clone())?;
        let context = DbExporter::new(exporters)
            .export_data(&mut writer, &configuration)
            .await?;
        writer.finish()?;

        info!(
            "Backup of {} tables written in {:.1}s",
            context.count::<crate::core::Table>(),
            started.elapsed().as_secs_f64()
        );
        Ok(context)
    }

    /// Recreate the tables of a backup document and load their data.
    pub async fn restore<R: BufRead + Send>(&self, input: R) -> Result<Context> {
        let started = Instant::now();
        let target = {
            let mut conn = self.connections.connection().await?;
            conn.information().await?
        };

        let importers: Vec<Box<dyn Importer>> = vec![
            Box::new(DatabaseInformationImporter::new(Arc::new(
                SchemaVersionChecker::new(self.options.schema_version),
            ))),
            Box::new(TableDefinitionImporter::new(
                self.cleaner.clone(),
                self.table_creator.clone(),
            )),
            Box::new(DataImporter::new(default_hooks(self.foreign_keys.clone()))),
        ];
        let configuration = ImportConfiguration {
            connections: self.connections.clone(),
            monitor: self.monitor.clone(),
            names: self.names(),
            cleanup: self.options.cleanup_mode,
            batch: self.options.batch_mode,
            target,
        };

        let mut reader = XmlNodeReader::new(input)?;
        let context = DbImporter::new(importers)
            .import_data(&mut reader, &configuration)
            .await?;

        info!(
            "Restore of {} tables finished in {:.1}s",
            context.count::<crate::core::Table>(),
            started.elapsed().as_secs_f64()
        );
        Ok(context)
    }
}

/// What a backup document contains, read without a database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub metadata: BTreeMap<String, String>,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: usize,
    pub foreign_keys: usize,
    /// Number of `row` elements, `None` when the document has no data for the table.
    pub rows: Option<u64>,
}

impl Inventory {
    fn table_mut(&mut self, name: &str) -> &mut TableSummary {
        let index = match self.tables.iter().position(|t| t.name == name) {
            Some(index) => index,
            None => {
                self.tables.push(TableSummary {
                    name: name.to_string(),
                    columns: 0,
                    foreign_keys: 0,
                    rows: None,
                });
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().filter_map(|t| t.rows).sum()
    }
}

/// Parse a whole document and summarize it. Rows are counted, not decoded.
pub fn inspect<R: BufRead + Send>(input: R) -> Result<Inventory> {
    let mut node = XmlNodeReader::new(input)?;
    let node: &mut dyn NodeParser = &mut node;
    let mut inventory = Inventory::default();

    check_start_node(node, elements::ROOT)?;
    node.next_node()?;
    loop {
        if node.name().is_empty() {
            return Err(BackupError::parse(
                format!("Document ended before </{}>", elements::ROOT),
                node.location(),
            ));
        }
        if node.is_closed() {
            check_end_node(node, elements::ROOT)?;
            break;
        }

        let name = node.name().to_string();
        match name.as_str() {
            database::NAME => {
                inventory.metadata.extend(read_meta(node)?);
            }
            table::NAME => {
                let table = node.required_attribute(table::NAME_ATTR)?.to_string();
                let children = count_children(node, table::NAME)?;
                let summary = inventory.table_mut(&table);
                summary.columns = children.get(elements::column::NAME).copied().unwrap_or(0) as usize;
                summary.foreign_keys =
                    children.get(elements::foreign_key::NAME).copied().unwrap_or(0) as usize;
            }
            data::NAME => {
                let table = node.required_attribute(data::TABLE_NAME)?.to_string();
                let children = count_children(node, data::NAME)?;
                inventory.table_mut(&table).rows =
                    Some(children.get(data::ROW).copied().unwrap_or(0));
            }
            _ => node.skip_element()?,
        }
        node.next_node()?;
    }

    Ok(inventory)
}

/// Count the child elements of the current node by name, leaving the cursor
/// on its close node.
fn count_children(node: &mut dyn NodeParser, parent: &str) -> Result<BTreeMap<String, u64>> {
    let mut counts = BTreeMap::new();
    node.next_node()?;
    loop {
        if node.name().is_empty() {
            return Err(BackupError::parse(
                format!("Document ended inside <{}>", parent),
                node.location(),
            ));
        }
        if node.is_closed() {
            break;
        }
        *counts.entry(node.name().to_string()).or_insert(0) += 1;
        node.skip_element()?;
        node.next_node()?;
    }
    check_end_node(node, parent)?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<backup xmlns="http://www.atlassian.com/ao" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <database-information>
    <meta key="database.name" value="PostgreSQL"/>
    <meta key="schema-version" value="3"/>
  </database-information>
  <table name="AO_BOOK">
    <column name="ID" primaryKey="true" autoIncrement="true" sqlType="-5" precision="19"/>
    <column name="TITLE" sqlType="12" precision="255"/>
    <foreign-key fromTable="AO_BOOK" fromColumn="AUTHOR" toTable="AO_AUTHOR" toColumn="ID"/>
  </table>
  <unknown><nested>text</nested></unknown>
  <data tableName="AO_BOOK">
    <column name="ID"/>
    <column name="TITLE"/>
    <row><integer>1</integer><string>Dune</string></row>
    <row><integer>2</integer><string xsi:nil="true"/></row>
  </data>
</backup>
"#;

    #[test]
    fn test_inspect_counts_tables_and_rows() {
        let inventory = inspect(DOCUMENT.as_bytes()).unwrap();
        assert_eq!(inventory.metadata.get("schema-version").map(String::as_str), Some("3"));
        assert_eq!(
            inventory.tables,
            vec![TableSummary {
                name: "AO_BOOK".to_string(),
                columns: 2,
                foreign_keys: 1,
                rows: Some(2),
            }]
        );
        assert_eq!(inventory.total_rows(), 2);
    }

    #[test]
    fn test_inspect_truncated_document() {
        let truncated = &DOCUMENT[..DOCUMENT.find("<data").unwrap()];
        assert!(inspect(truncated.as_bytes()).is_err());
    }
}
