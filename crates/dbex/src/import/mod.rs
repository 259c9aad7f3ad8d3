//! Import pipeline: node stream to live database.
//!
//! [`DbImporter`] walks the children of the root node and hands each one to
//! the first [`Importer`] that supports it. The default importers mirror the
//! export stages:
//!
//! 1. [`DatabaseInformationImporter`]: parses metadata and runs the
//!    compatibility check before anything is written
//! 2. [`TableDefinitionImporter`]: cleans the target and creates the tables,
//!    without their foreign keys
//! 3. [`DataImporter`]: inserts rows, wrapped by the vendor around hooks
//!
//! Elements no importer claims are skipped with their whole subtree.

mod data;
mod database_information;
pub mod inserter;
mod table_definition;

pub use data::DataImporter;
pub use database_information::{
    DatabaseInformationChecker, DatabaseInformationImporter, NoopChecker, SchemaVersionChecker,
};
pub(crate) use database_information::read_meta;
pub use table_definition::TableDefinitionImporter;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{
    CleanupMode, ConnectionProvider, Context, DatabaseInformation, EntityNameProcessor,
};
use crate::error::{BackupError, Result};
use crate::node::{check_end_node, check_start_node, describe, elements, NodeParser};
use crate::progress::ProgressMonitor;

/// How rows are sent to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Accumulate rows and flush every [`inserter::BATCH_SIZE`] rows.
    #[default]
    On,
    /// One round trip per row.
    Off,
}

/// Collaborators and settings of one import run.
#[derive(Clone)]
pub struct ImportConfiguration {
    pub connections: Arc<dyn ConnectionProvider>,
    pub monitor: Arc<dyn ProgressMonitor>,

    /// Maps document names to target names.
    pub names: Arc<dyn EntityNameProcessor>,

    pub cleanup: CleanupMode,
    pub batch: BatchMode,

    /// Metadata of the target database; its vendor drives the around hooks.
    pub target: DatabaseInformation,
}

/// One stage of the import pipeline.
///
/// `import_node` is called with the cursor on the entry of a supported
/// element. It may consume that element and any run of siblings it also
/// handles, and must return with the cursor on the first node it did not
/// consume.
#[async_trait]
pub trait Importer: Send + Sync {
    fn supports(&self, node: &dyn NodeParser) -> bool;

    async fn import_node(
        &self,
        node: &mut dyn NodeParser,
        configuration: &ImportConfiguration,
        context: &mut Context,
    ) -> Result<()>;
}

/// Skips an element and everything below it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpImporter;

#[async_trait]
impl Importer for NoOpImporter {
    fn supports(&self, _node: &dyn NodeParser) -> bool {
        true
    }

    async fn import_node(
        &self,
        node: &mut dyn NodeParser,
        _configuration: &ImportConfiguration,
        _context: &mut Context,
    ) -> Result<()> {
        debug!("Skipping unknown node {}", describe(&*node));
        node.skip_element()?;
        node.next_node()?;
        Ok(())
    }
}

/// Dispatches the root's children to importers in document order.
pub struct DbImporter {
    importers: Vec<Box<dyn Importer>>,
}

impl DbImporter {
    pub fn new(importers: Vec<Box<dyn Importer>>) -> Self {
        Self { importers }
    }

    /// Import a whole document. `node` must be positioned on the root.
    /// Returns the run context.
    pub async fn import_data(
        &self,
        node: &mut dyn NodeParser,
        configuration: &ImportConfiguration,
    ) -> Result<Context> {
        check_start_node(node, elements::ROOT)?;
        let mut context = Context::new();

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

            match self.importers.iter().find(|i| i.supports(&*node)) {
                Some(importer) => importer.import_node(node, configuration, &mut context).await?,
                None => NoOpImporter.import_node(node, configuration, &mut context).await?,
            }
        }

        info!("Import finished");
        Ok(context)
    }
}
