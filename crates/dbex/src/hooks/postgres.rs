use async_trait::async_trait;
use tracing::debug;

use super::{next_value, tables, AroundImporter};
use crate::core::{Connection, Context, Vendor};
use crate::error::Result;
use crate::import::ImportConfiguration;

/// Moves every serial sequence past the restored values.
///
/// Sequences follow the `{table}_{column}_seq` naming that `SERIAL`
/// columns get. Only the table and column parts go through the name
/// processor, the suffix is always lower case.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSequencesHook;

#[async_trait]
impl AroundImporter for PostgresSequencesHook {
    async fn after(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
    ) -> Result<()> {
        if configuration.target.vendor() != Vendor::Postgres {
            return Ok(());
        }

        for table in tables(context) {
            for column in table.auto_increment_columns() {
                let start = next_value(conn, &table.name, &column.name).await?;
                let names = &configuration.names;
                let sequence = format!(
                    "{}_{}_seq",
                    names.table_name(&table.name),
                    names.column_name(&column.name)
                );
                let sql = format!("ALTER SEQUENCE {} RESTART WITH {}", conn.quote(&sequence)?, start);
                debug!("{}", sql);
                conn.execute(&sql).await?;
            }
        }
        Ok(())
    }
}
