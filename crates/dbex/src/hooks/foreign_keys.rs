use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{tables, AroundImporter};
use crate::core::{Connection, Context, ForeignKey, ForeignKeyCreator};
use crate::error::Result;
use crate::import::ImportConfiguration;

/// Recreates the foreign keys held back by the table definition stage.
///
/// Registered last among the default hooks, so its `after` runs first once
/// every table is loaded.
pub struct ForeignKeyHook {
    creator: Arc<dyn ForeignKeyCreator>,
}

impl ForeignKeyHook {
    pub fn new(creator: Arc<dyn ForeignKeyCreator>) -> Self {
        Self { creator }
    }
}

#[async_trait]
impl AroundImporter for ForeignKeyHook {
    async fn after(
        &self,
        conn: &mut dyn Connection,
        _configuration: &ImportConfiguration,
        context: &Context,
    ) -> Result<()> {
        let foreign_keys: Vec<ForeignKey> = tables(context)
            .into_iter()
            .flat_map(|t| t.foreign_keys.iter().cloned())
            .collect();
        if foreign_keys.is_empty() {
            return Ok(());
        }

        info!("Recreating {} foreign keys", foreign_keys.len());
        self.creator.create(conn, &foreign_keys).await
    }
}
