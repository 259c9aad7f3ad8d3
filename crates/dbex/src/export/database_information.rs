use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ExportConfiguration, Exporter};
use crate::core::{Connection, Context, DatabaseInformation};
use crate::error::Result;
use crate::node::{elements::database, NodeCreator};
use crate::progress::Task;

/// Contributes entries to the exported database information.
#[async_trait]
pub trait DatabaseInformationReader: Send + Sync {
    async fn read(&self, conn: &mut dyn Connection) -> Result<BTreeMap<String, String>>;
}

/// Product and driver details of the live connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionInformationReader;

#[async_trait]
impl DatabaseInformationReader for ConnectionInformationReader {
    async fn read(&self, conn: &mut dyn Connection) -> Result<BTreeMap<String, String>> {
        Ok(conn.information().await?.into_map())
    }
}

/// Fixed entries supplied by the caller, such as the schema version and
/// plugin identity.
#[derive(Debug, Clone, Default)]
pub struct StaticInformationReader {
    entries: BTreeMap<String, String>,
}

impl StaticInformationReader {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DatabaseInformationReader for StaticInformationReader {
    async fn read(&self, _conn: &mut dyn Connection) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.clone())
    }
}

/// Writes the `database-information` element.
pub struct DatabaseInformationExporter {
    readers: Vec<Box<dyn DatabaseInformationReader>>,
}

impl DatabaseInformationExporter {
    pub fn new(readers: Vec<Box<dyn DatabaseInformationReader>>) -> Self {
        Self { readers }
    }
}

#[async_trait]
impl Exporter for DatabaseInformationExporter {
    async fn export(
        &self,
        node: &mut dyn NodeCreator,
        configuration: &ExportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::DatabaseInformation);

        let mut conn = configuration.connections.connection().await?;
        let mut meta = BTreeMap::new();
        for reader in &self.readers {
            meta.extend(reader.read(conn.as_mut()).await?);
        }

        if !meta.is_empty() {
            node.add_node(database::NAME)?;
            for (key, value) in &meta {
                node.add_node(database::META)?;
                node.add_attribute(database::KEY, key)?;
                node.add_attribute(database::VALUE, value)?;
                node.close_entity()?;
            }
            node.close_entity()?;
        }

        context.put(DatabaseInformation::new(meta));
        monitor.end(&Task::DatabaseInformation);
        Ok(())
    }
}
