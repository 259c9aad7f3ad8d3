//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{CleanupMode, NameCase};
use crate::drivers::postgres::SslMode;
use crate::import::BatchMode;
use crate::node::elements::DEFAULT_NAMESPACE;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backup source and restore target.
    pub database: DatabaseConfig,

    /// Backup and restore behavior.
    #[serde(default)]
    pub backup: BackupConfig,
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schema holding the backed up tables (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// TLS mode (default: disable).
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Backup document and restore behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Default namespace of written documents.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Only tables starting with this prefix are backed up.
    #[serde(default)]
    pub table_prefix: Option<String>,

    /// Batch inserts on restore (default: on).
    #[serde(default)]
    pub batch_mode: BatchMode,

    /// Drop colliding tables before a restore (default: clean).
    #[serde(default)]
    pub cleanup_mode: CleanupMode,

    /// Case folding applied to restored table and column names.
    #[serde(default)]
    pub name_case: NameCase,

    /// Schema version written on backup and the highest accepted on restore.
    #[serde(default)]
    pub schema_version: i64,

    /// Plugin identity written as metadata.
    #[serde(default)]
    pub plugin: Option<PluginConfig>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            table_prefix: None,
            batch_mode: BatchMode::default(),
            cleanup_mode: CleanupMode::default(),
            name_case: NameCase::default(),
            schema_version: 0,
            plugin: None,
        }
    }
}

/// Identity of the plugin owning the backed up tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    pub key: String,
    pub version: String,
    #[serde(default)]
    pub hash: Option<String>,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
