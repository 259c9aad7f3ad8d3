use async_trait::async_trait;
use tracing::debug;

use super::{next_value, tables, AroundImporter};
use crate::core::{Connection, Context, Vendor};
use crate::error::Result;
use crate::import::ImportConfiguration;

/// Oracle emulates auto-increment with a sequence plus an insert trigger.
///
/// Before the load every trigger is disabled so restored keys are kept and
/// the sequences are dropped. After the load each sequence is recreated to
/// start past the highest restored key and the triggers are enabled again.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleSequencesHook;

impl OracleSequencesHook {
    fn sequence_name(configuration: &ImportConfiguration, table: &str, column: &str) -> String {
        let names = &configuration.names;
        format!("{}_{}_SEQ", names.table_name(table), names.column_name(column))
    }

    async fn triggers(conn: &mut dyn Connection, context: &Context, action: &str) -> Result<()> {
        for table in tables(context) {
            let sql = format!("ALTER TABLE {} {} ALL TRIGGERS", conn.quote(&table.name)?, action);
            debug!("{}", sql);
            conn.execute(&sql).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AroundImporter for OracleSequencesHook {
    async fn before(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
    ) -> Result<()> {
        if configuration.target.vendor() != Vendor::Oracle {
            return Ok(());
        }

        Self::triggers(conn, context, "DISABLE").await?;
        for table in tables(context) {
            for column in table.auto_increment_columns() {
                let sequence = Self::sequence_name(configuration, &table.name, &column.name);
                let sql = format!("DROP SEQUENCE {}", conn.quote(&sequence)?);
                debug!("{}", sql);
                conn.execute(&sql).await?;
            }
        }
        Ok(())
    }

    async fn after(
        &self,
        conn: &mut dyn Connection,
        configuration: &ImportConfiguration,
        context: &Context,
    ) -> Result<()> {
        if configuration.target.vendor() != Vendor::Oracle {
            return Ok(());
        }

        for table in tables(context) {
            for column in table.auto_increment_columns() {
                let start = next_value(conn, &table.name, &column.name).await?;
                let sequence = Self::sequence_name(configuration, &table.name, &column.name);
                let sql = format!(
                    "CREATE SEQUENCE {} INCREMENT BY 1 START WITH {} NOMAXVALUE MINVALUE {}",
                    conn.quote(&sequence)?,
                    start,
                    start
                );
                debug!("{}", sql);
                conn.execute(&sql).await?;
            }
        }
        Self::triggers(conn, context, "ENABLE").await
    }
}
