use async_trait::async_trait;
use tracing::debug;

use super::{tables, AroundImporter};
use crate::core::{Connection, Context, Vendor};
use crate::error::Result;
use crate::import::ImportConfiguration;

/// Lets explicit values into identity columns on SQL Server.
///
/// `IDENTITY_INSERT` can only be on for one table per session, so it is
/// switched per table rather than around the whole import.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerIdentityHook;

impl SqlServerIdentityHook {
    async fn identity_insert(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
        table: &str,
        on: bool,
    ) -> Result<()> {
        if configuration.target.vendor() != Vendor::SqlServer {
            return Ok(());
        }
        let has_identity = tables(context)
            .iter()
            .any(|t| t.name == table && t.has_auto_increment());
        if !has_identity {
            return Ok(());
        }

        let sql = format!(
            "SET IDENTITY_INSERT {} {}",
            conn.quote(table)?,
            if on { "ON" } else { "OFF" }
        );
        debug!("{}", sql);
        conn.execute(&sql).await?;
        Ok(())
    }
}

#[async_trait]
impl AroundImporter for SqlServerIdentityHook {
    async fn before_table(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
        table: &str,
    ) -> Result<()> {
        self.identity_insert(conn, configuration, context, table, true).await
    }

    async fn after_table(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
        table: &str,
    ) -> Result<()> {
        self.identity_insert(conn, configuration, context, table, false).await
    }
}
