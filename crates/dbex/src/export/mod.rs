//! Export pipeline: live database to node stream.
//!
//! [`DbExporter`] opens the root node and runs its exporters in order, by
//! default:
//!
//! 1. [`DatabaseInformationExporter`]: product, driver and caller metadata
//! 2. [`TableDefinitionExporter`]: tables, columns and foreign keys
//! 3. [`DataExporter`]: one `data` element per table with all of its rows
//!
//! Exporters share a [`Context`]; later stages read what earlier ones put there.

mod data;
mod database_information;
mod table_definition;

pub use data::DataExporter;
pub use database_information::{
    ConnectionInformationReader, DatabaseInformationExporter, DatabaseInformationReader,
    StaticInformationReader,
};
pub use table_definition::TableDefinitionExporter;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::{ConnectionProvider, Context, TableSelector};
use crate::error::Result;
use crate::node::{elements, NodeCreator};
use crate::progress::ProgressMonitor;

/// Collaborators of one export run.
#[derive(Clone)]
pub struct ExportConfiguration {
    /// Source of the connection each stage uses.
    pub connections: Arc<dyn ConnectionProvider>,

    /// Receives progress notifications.
    pub monitor: Arc<dyn ProgressMonitor>,

    /// Which live tables are exported.
    pub selector: Arc<dyn TableSelector>,
}

/// One stage of the export pipeline.
#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(
        &self,
        node: &mut dyn NodeCreator,
        configuration: &ExportConfiguration,
        context: &mut Context,
    ) -> Result<()>;
}

/// Runs exporters in order under a single root node.
pub struct DbExporter {
    exporters: Vec<Box<dyn Exporter>>,
}

impl DbExporter {
    pub fn new(exporters: Vec<Box<dyn Exporter>>) -> Self {
        Self { exporters }
    }

    /// Write the whole document. Returns the run context so callers can
    /// inspect what was exported.
    pub async fn export_data(
        &self,
        node: &mut dyn NodeCreator,
        configuration: &ExportConfiguration,
    ) -> Result<Context> {
        let mut context = Context::new();

        node.add_node(elements::ROOT)?;
        for exporter in &self.exporters {
            exporter.export(node, configuration, &mut context).await?;
        }
        node.close_entity()?;

        info!("Export finished");
        Ok(context)
    }
}
