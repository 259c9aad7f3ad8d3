//! Schema introspection and DDL for PostgreSQL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::types;
use super::PostgresDatabase;
use crate::core::schema::order_by_dependencies;
use crate::core::{
    CleanupMode, Column, Connection, DatabaseCleaner, ForeignKey, ForeignKeyCreator, Table,
    TableCreator, TableReader,
};
use crate::error::Result;
use crate::progress::ProgressMonitor;

impl PostgresDatabase {
    async fn load_table_names(&self) -> Result<Vec<String>> {
        let client = self.client("getting connection for load_table_names").await?;
        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;
        let rows = client.query(query, &[&self.schema()]).await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// Load columns for a table.
    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let client = self.client("getting connection for load_columns").await?;

        let query = r#"
            SELECT
                column_name::text,
                udt_name::text,
                character_maximum_length::int4,
                numeric_precision::int4,
                numeric_scale::int4,
                (is_identity = 'YES' OR COALESCE(column_default, '') LIKE 'nextval(%') AS auto_increment
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client.query(query, &[&self.schema(), &table.name]).await?;

        for row in rows {
            let udt: String = row.get(1);
            let mut column = Column::new(row.get::<_, String>(0), types::sql_type_from_udt(&udt));
            let length: Option<i32> = row.get(2);
            let precision: Option<i32> = row.get(3);
            let scale: Option<i32> = row.get(4);

            if column.sql_type.is_text() {
                if let Some(length) = length {
                    column = column.with_precision(length);
                }
            } else if udt == "numeric" {
                if let Some(precision) = precision {
                    column = column.with_precision(precision);
                }
                if let Some(scale) = scale {
                    column = column.with_scale(scale);
                }
            }
            if row.get::<_, bool>(5) {
                column = column.auto_increment();
            }
            table.columns.push(column);
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(())
    }

    /// Load primary key for a table.
    async fn load_primary_key(&self, table: &mut Table) -> Result<()> {
        let client = self.client("getting connection for load_primary_key").await?;

        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let rows = client.query(query, &[&self.schema(), &table.name]).await?;
        for row in rows {
            let name: String = row.get(0);
            if let Some(column) = table.columns.iter_mut().find(|c| c.name == name) {
                column.primary_key = true;
            }
        }
        Ok(())
    }

    /// Load single-column foreign keys for a table. Composite keys cannot be
    /// represented in a backup and are skipped.
    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let client = self.client("getting connection for load_foreign_keys").await?;

        let query = r#"
            SELECT
                c.conname::text AS fk_name,
                a.attname::text AS column_name,
                rt.relname::text AS ref_table,
                ra.attname::text AS ref_column
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey) AS k(attnum, ref_attnum)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.ref_attnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            ORDER BY c.conname
        "#;

        let rows = client.query(query, &[&self.schema(), &table.name]).await?;

        let mut grouped: BTreeMap<String, Vec<(String, String, String)>> = BTreeMap::new();
        for row in rows {
            grouped
                .entry(row.get(0))
                .or_default()
                .push((row.get(1), row.get(2), row.get(3)));
        }

        for (name, mut columns) in grouped {
            if columns.len() != 1 {
                warn!(
                    "Skipping foreign key {} of {}: composite keys are not supported",
                    name, table.name
                );
                continue;
            }
            if let Some((column, to_table, to_column)) = columns.pop() {
                table.foreign_keys.push(ForeignKey::new(
                    Some(&name),
                    table.name.clone(),
                    column,
                    to_table,
                    to_column,
                ));
            }
        }

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.name
        );
        Ok(())
    }
}

/// `CREATE TABLE` statement for one table, without foreign keys.
fn create_table_sql(conn: &dyn Connection, table: &Table) -> Result<String> {
    let mut parts = Vec::with_capacity(table.columns.len() + 1);
    for column in &table.columns {
        let mut definition = format!("{} {}", conn.quote(&column.name)?, types::ddl_type(column)?);
        if column.primary_key {
            definition.push_str(" NOT NULL");
        }
        parts.push(definition);
    }

    let primary_key = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| conn.quote(&c.name))
        .collect::<Result<Vec<_>>>()?;
    if !primary_key.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        conn.quote(&table.name)?,
        parts.join(", ")
    ))
}

#[async_trait]
impl TableReader for PostgresDatabase {
    async fn read(&self, _conn: &mut dyn Connection) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        for name in self.load_table_names().await? {
            let mut table = Table::new(name, Vec::new(), Vec::new());
            self.load_columns(&mut table).await?;
            self.load_primary_key(&mut table).await?;
            self.load_foreign_keys(&mut table).await?;
            tables.push(table);
        }
        info!("Read {} table definitions from schema {}", tables.len(), self.schema());
        Ok(tables)
    }
}

#[async_trait]
impl TableCreator for PostgresDatabase {
    async fn create(
        &self,
        conn: &mut dyn Connection,
        tables: &[Table],
        monitor: &dyn ProgressMonitor,
    ) -> Result<()> {
        for table in tables {
            monitor.update(&format!("Creating table {}", table.name));
            let sql = create_table_sql(&*conn, table)?;
            conn.execute(&sql).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseCleaner for PostgresDatabase {
    async fn cleanup(&self, conn: &mut dyn Connection, mode: CleanupMode, tables: &[Table]) -> Result<()> {
        if mode == CleanupMode::None {
            return Ok(());
        }
        for table in order_by_dependencies(tables).into_iter().rev() {
            let sql = format!("DROP TABLE {} CASCADE", conn.quote(&table.name)?);
            match conn.execute(&sql).await {
                Ok(_) => debug!("Dropped table {}", table.name),
                Err(e) if e.is_missing_object() => debug!("Table {} did not exist", table.name),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ForeignKeyCreator for PostgresDatabase {
    async fn create(&self, conn: &mut dyn Connection, foreign_keys: &[ForeignKey]) -> Result<()> {
        for fk in foreign_keys {
            let sql = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                conn.quote(&fk.from_table)?,
                conn.quote(&fk.name)?,
                conn.quote(&fk.from_column)?,
                conn.quote(&fk.to_table)?,
                conn.quote(&fk.to_column)?
            );
            conn.execute(&sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConnectionProvider, SqlType};
    use crate::drivers::MemoryDatabase;

    #[tokio::test]
    async fn test_create_table_sql() {
        let db = MemoryDatabase::new("PostgreSQL");
        let conn = db.connection().await.unwrap();
        let table = Table::new(
            "AO_BOOK",
            vec![
                Column::new("ID", SqlType::BigInt).primary_key().auto_increment(),
                Column::new("TITLE", SqlType::VarChar).with_precision(255),
            ],
            vec![],
        );
        assert_eq!(
            create_table_sql(conn.as_ref(), &table).unwrap(),
            "CREATE TABLE \"AO_BOOK\" (\"ID\" BIGSERIAL NOT NULL, \"TITLE\" VARCHAR(255), PRIMARY KEY (\"ID\"))"
        );
    }
}
