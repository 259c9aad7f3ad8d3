//! PostgreSQL driver.
//!
//! [`PostgresDatabase`] owns a `deadpool-postgres` pool for one schema and
//! implements every collaborator: it hands out [`PostgresConnection`]s,
//! introspects tables, renders DDL, cleans up before a restore and creates
//! foreign keys.

mod connection;
mod schema;
mod tls;
mod types;

pub use connection::PostgresConnection;
pub use tls::SslMode;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::core::{identifier, Connection, ConnectionProvider, Vendor};
use crate::error::{BackupError, Result};

/// Connection pool bound to one PostgreSQL schema.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool,
    schema: String,
}

impl PostgresDatabase {
    /// Build the pool and check that the server answers.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        identifier::validate_identifier(&config.schema)?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("dbex");
        pg_config.keepalives(true);
        pg_config.connect_timeout(std::time::Duration::from_secs(30));

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };
        let mgr = match tls::connector(config.ssl_mode) {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
            Some(connector) => Manager::from_config(pg_config, connector, mgr_config),
        };
        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| BackupError::pool(e, "creating PostgreSQL pool"))?;

        let database = Self {
            pool,
            schema: config.schema.clone(),
        };
        let client = database.client("testing PostgreSQL connection").await?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(database)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Server version string, as reported by `SHOW server_version`.
    pub async fn server_version(&self) -> Result<String> {
        let client = self.client("reading server version").await?;
        let row = client.query_one("SHOW server_version", &[]).await?;
        Ok(row.get(0))
    }

    async fn client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| BackupError::pool(e, context))
    }
}

#[async_trait]
impl ConnectionProvider for PostgresDatabase {
    async fn connection(&self) -> Result<Box<dyn Connection>> {
        let client = self.client("acquiring connection").await?;
        client
            .batch_execute(&format!(
                "SET search_path TO {}",
                identifier::quote(Vendor::Postgres, &self.schema)?
            ))
            .await?;
        Ok(Box::new(PostgresConnection::new(client, self.schema.clone())))
    }
}
