use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::Object;
use futures::StreamExt;
use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::{debug, warn};

use super::types::{self, Param};
use crate::core::information::keys;
use crate::core::{
    BatchOutcome, ColumnMetadata, Connection, DatabaseInformation, InsertStatement, ResultSet, Row,
    SqlValue, StatementHandle, Vendor,
};
use crate::error::{BackupError, Result};

/// One pooled PostgreSQL session.
///
/// PostgreSQL has no session-level auto-commit switch, so turning it off
/// opens a transaction with `BEGIN` and every commit or rollback opens the
/// next one. A connection dropped inside a transaction is detached from the
/// pool and closed instead of being recycled.
pub struct PostgresConnection {
    client: Option<Object>,
    schema: String,
    auto_commit: bool,
    statements: HashMap<u64, Statement>,
    next_statement: u64,
}

impl PostgresConnection {
    pub(crate) fn new(client: Object, schema: String) -> Self {
        Self {
            client: Some(client),
            schema,
            auto_commit: true,
            statements: HashMap::new(),
            next_statement: 0,
        }
    }

    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| BackupError::IllegalState("connection already released".to_string()))
    }

    fn statement(&self, handle: StatementHandle) -> Result<Statement> {
        self.statements.get(&handle.0).cloned().ok_or_else(|| {
            BackupError::IllegalState(format!("unknown prepared statement #{}", handle.0))
        })
    }

    async fn run(&self, statement: &Statement, values: &[SqlValue]) -> Result<u64> {
        if values.len() != statement.params().len() {
            return Err(BackupError::IllegalState(format!(
                "statement expects {} parameters, got {}",
                statement.params().len(),
                values.len()
            )));
        }
        let params = values
            .iter()
            .zip(statement.params())
            .map(|(value, ty)| types::to_param(value, ty))
            .collect::<Result<Vec<Param>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        Ok(self.client()?.execute(statement, &refs).await?)
    }
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        if !self.auto_commit {
            if let Some(client) = self.client.take() {
                debug!("Closing connection left inside a transaction");
                drop(Object::take(client));
            }
        }
    }
}

/// Leading `major.minor` of a version string such as `16.2 (Debian 16.2-1)`.
fn version_parts(version: &str) -> (String, String) {
    let number: String = version
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = number.split('.');
    let major = parts.next().filter(|p| !p.is_empty()).unwrap_or("0");
    let minor = parts.next().filter(|p| !p.is_empty()).unwrap_or("0");
    (major.to_string(), minor.to_string())
}

#[async_trait]
impl Connection for PostgresConnection {
    fn vendor(&self) -> Vendor {
        Vendor::Postgres
    }

    async fn information(&mut self) -> Result<DatabaseInformation> {
        let row = self.client()?.query_one("SHOW server_version", &[]).await?;
        let version: String = row.get(0);
        let (major, minor) = version_parts(&version);
        Ok([
            (keys::DATABASE_NAME, "PostgreSQL".to_string()),
            (keys::DATABASE_VERSION, version),
            (keys::DATABASE_MAJOR_VERSION, major),
            (keys::DATABASE_MINOR_VERSION, minor),
            (keys::DRIVER_NAME, "dbex tokio-postgres".to_string()),
            (keys::DRIVER_VERSION, env!("CARGO_PKG_VERSION").to_string()),
        ]
        .into_iter()
        .collect())
    }

    async fn table_names(&mut self) -> Result<Vec<String>> {
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;
        let rows = self.client()?.query(query, &[&self.schema]).await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn columns(&mut self, table: &str) -> Result<Vec<ColumnMetadata>> {
        let query = r#"
            SELECT
                column_name::text,
                udt_name::text,
                character_maximum_length::int4
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;
        let rows = self.client()?.query(query, &[&self.schema, &table]).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let type_name: String = row.get(1);
                let size: Option<i32> = row.get(2);
                ColumnMetadata {
                    name: row.get(0),
                    sql_type: types::sql_type_from_udt(&type_name),
                    type_name,
                    size: size.and_then(|s| usize::try_from(s).ok()),
                }
            })
            .collect())
    }

    async fn select_all(&mut self, table: &str) -> Result<ResultSet> {
        let declared = self.columns(table).await?;
        let sql = format!("SELECT * FROM {}", self.quote(table)?);
        let client = self.client()?;
        let statement = client.prepare(&sql).await?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| ColumnMetadata {
                name: column.name().to_string(),
                sql_type: types::sql_type_from_pg(column.type_()),
                type_name: column.type_().name().to_string(),
                size: declared
                    .iter()
                    .find(|d| d.name == column.name())
                    .and_then(|d| d.size),
            })
            .collect();

        let stream = client
            .query_raw(&statement, std::iter::empty::<&(dyn ToSql + Sync)>())
            .await?;
        let rows = stream
            .map(|row| {
                let row = row?;
                (0..row.len())
                    .map(|i| types::read_value(&row, i))
                    .collect::<Result<Row>>()
            })
            .boxed();

        Ok(ResultSet { columns, rows })
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("Executing: {}", sql);
        Ok(self.client()?.execute(sql, &[]).await?)
    }

    async fn query_scalar(&mut self, sql: &str) -> Result<Option<SqlValue>> {
        debug!("Querying: {}", sql);
        match self.client()?.query_opt(sql, &[]).await? {
            Some(row) if !row.is_empty() => Ok(Some(types::read_value(&row, 0)?)),
            _ => Ok(None),
        }
    }

    async fn prepare(&mut self, insert: &InsertStatement) -> Result<StatementHandle> {
        let statement = self.client()?.prepare(&insert.sql).await?;
        let handle = StatementHandle(self.next_statement);
        self.next_statement += 1;
        self.statements.insert(handle.0, statement);
        Ok(handle)
    }

    async fn execute_prepared(&mut self, statement: StatementHandle, params: &[SqlValue]) -> Result<u64> {
        let statement = self.statement(statement)?;
        self.run(&statement, params).await
    }

    async fn execute_batch(&mut self, statement: StatementHandle, rows: &[Row]) -> Result<Vec<BatchOutcome>> {
        let statement = self.statement(statement)?;
        let mut outcomes = Vec::with_capacity(rows.len());
        for row in rows {
            match self.run(&statement, row).await {
                Ok(count) => outcomes.push(BatchOutcome::Success(count)),
                Err(e @ BackupError::Database(_)) => {
                    // The transaction is aborted, later rows cannot succeed.
                    warn!("Batch row {} failed: {}", outcomes.len() + 1, e);
                    outcomes.push(BatchOutcome::Failed(e));
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    async fn close_statement(&mut self, statement: StatementHandle) -> Result<()> {
        self.statements.remove(&statement.0);
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        let sql = if auto_commit { "COMMIT" } else { "BEGIN" };
        self.client()?.batch_execute(sql).await?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if !self.auto_commit {
            self.client()?.batch_execute("COMMIT; BEGIN").await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.auto_commit {
            self.client()?.batch_execute("ROLLBACK; BEGIN").await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parts() {
        assert_eq!(
            version_parts("16.2 (Debian 16.2-1.pgdg120+2)"),
            ("16".to_string(), "2".to_string())
        );
        assert_eq!(version_parts("9.6.24"), ("9".to_string(), "6".to_string()));
        assert_eq!(version_parts("17devel"), ("17".to_string(), "0".to_string()));
        assert_eq!(version_parts("beta"), ("0".to_string(), "0".to_string()));
    }
}
