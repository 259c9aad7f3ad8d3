//! Configuration validation.

use super::Config;
use crate::error::{BackupError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.host.is_empty() {
        return Err(BackupError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(BackupError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(BackupError::Config("database.user is required".into()));
    }
    if config.database.max_connections == 0 {
        return Err(BackupError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }

    if config.backup.namespace.is_empty() {
        return Err(BackupError::Config("backup.namespace is required".into()));
    }
    if config.backup.schema_version < 0 {
        return Err(BackupError::Config(format!(
            "backup.schema_version must not be negative, got {}",
            config.backup.schema_version
        )));
    }
    if let Some(prefix) = &config.backup.table_prefix {
        if prefix.is_empty() {
            return Err(BackupError::Config(
                "backup.table_prefix must not be empty when set".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackupConfig, DatabaseConfig};
    use crate::core::{CleanupMode, NameCase};
    use crate::drivers::postgres::SslMode;
    use crate::import::BatchMode;

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "app".to_string(),
                user: "app".to_string(),
                password: "secret_password_123".to_string(),
                schema: "public".to_string(),
                ssl_mode: SslMode::Disable,
                max_connections: 4,
            },
            backup: BackupConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.database.host = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("database.host is required"));
    }

    #[test]
    fn test_zero_connections() {
        let mut config = valid_config();
        config.database.max_connections = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_negative_schema_version() {
        let mut config = valid_config();
        config.backup.schema_version = -1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let debug_output = format!("{:?}", valid_config());
        assert!(
            !debug_output.contains("secret_password_123"),
            "Debug output should not contain the password"
        );
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
    }

    #[test]
    fn test_yaml_defaults() {
        let config = Config::from_yaml(
            "database:\n  host: db\n  database: app\n  user: app\n",
        )
        .unwrap();
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.schema, "public");
        assert_eq!(config.database.ssl_mode, SslMode::Disable);
        assert_eq!(config.backup.namespace, "http://www.atlassian.com/ao");
        assert_eq!(config.backup.batch_mode, BatchMode::On);
        assert_eq!(config.backup.cleanup_mode, CleanupMode::Clean);
        assert_eq!(config.backup.name_case, NameCase::Preserve);
    }

    #[test]
    fn test_yaml_backup_section() {
        let config = Config::from_yaml(
            r#"
database:
  host: db
  database: app
  user: app
  ssl_mode: verify-full
backup:
  table_prefix: AO_
  batch_mode: off
  cleanup_mode: none
  name_case: upper
  schema_version: 2
  plugin:
    name: Demo
    key: com.example.demo
    version: "1.0"
"#,
        )
        .unwrap();
        assert_eq!(config.database.ssl_mode, SslMode::VerifyFull);
        assert_eq!(config.backup.batch_mode, BatchMode::Off);
        assert_eq!(config.backup.cleanup_mode, CleanupMode::None);
        assert_eq!(config.backup.name_case, NameCase::Upper);

        let meta = config.backup.metadata();
        assert_eq!(meta.get("schema-version").map(String::as_str), Some("2"));
        assert_eq!(meta.get("plugin.key").map(String::as_str), Some("com.example.demo"));
        assert!(!meta.contains_key("plugin.ao.hash"));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("database: [unclosed"),
            Err(BackupError::Yaml(_))
        ));
    }
}
