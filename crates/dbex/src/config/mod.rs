//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::information::keys;
use crate::error::Result;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl BackupConfig {
    /// Caller metadata written next to the database information: the
    /// schema version and, when configured, the plugin identity.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert(keys::SCHEMA_VERSION.to_string(), self.schema_version.to_string());
        if let Some(plugin) = &self.plugin {
            meta.insert(keys::PLUGIN_NAME.to_string(), plugin.name.clone());
            meta.insert(keys::PLUGIN_KEY.to_string(), plugin.key.clone());
            meta.insert(keys::PLUGIN_VERSION.to_string(), plugin.version.clone());
            if let Some(hash) = &plugin.hash {
                meta.insert(keys::PLUGIN_HASH.to_string(), hash.clone());
            }
        }
        meta
    }
}
