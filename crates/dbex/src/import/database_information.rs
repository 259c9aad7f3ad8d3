use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ImportConfiguration, Importer};
use crate::core::information::keys;
use crate::core::{Context, DatabaseInformation};
use crate::error::{BackupError, Result};
use crate::node::elements::database;
use crate::node::{check_end_node, check_start_node, is_start, NodeParser};
use crate::progress::{ProgressMonitor, Task};

/// Decides whether a document can be restored, before anything is written.
pub trait DatabaseInformationChecker: Send + Sync {
    fn check(&self, info: &DatabaseInformation, monitor: &dyn ProgressMonitor) -> Result<()>;
}

/// Accepts every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChecker;

impl DatabaseInformationChecker for NoopChecker {
    fn check(&self, _info: &DatabaseInformation, _monitor: &dyn ProgressMonitor) -> Result<()> {
        Ok(())
    }
}

/// Rejects documents written by a newer schema than this importer supports.
///
/// Documents without a `schema-version` entry are always accepted.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVersionChecker {
    supported: i64,
}

impl SchemaVersionChecker {
    pub fn new(supported: i64) -> Self {
        Self { supported }
    }
}

impl DatabaseInformationChecker for SchemaVersionChecker {
    fn check(&self, info: &DatabaseInformation, monitor: &dyn ProgressMonitor) -> Result<()> {
        monitor.update("Checking schema version");
        let found = info.get_int(keys::SCHEMA_VERSION, -1)?;
        if found > self.supported {
            return Err(BackupError::Incompatible(format!(
                "ERROR: This backup archive is from a newer version cannot be restored in this version (schema {} > {})",
                found, self.supported
            )));
        }
        debug!("Schema version {} accepted (supported {})", found, self.supported);
        Ok(())
    }
}

/// Reads the `database-information` element.
pub struct DatabaseInformationImporter {
    checker: Arc<dyn DatabaseInformationChecker>,
}

impl DatabaseInformationImporter {
    pub fn new(checker: Arc<dyn DatabaseInformationChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Importer for DatabaseInformationImporter {
    fn supports(&self, node: &dyn NodeParser) -> bool {
        is_start(node, database::NAME)
    }

    async fn import_node(
        &self,
        node: &mut dyn NodeParser,
        configuration: &ImportConfiguration,
        context: &mut Context,
    ) -> Result<()> {
        let monitor = configuration.monitor.as_ref();
        monitor.begin(&Task::DatabaseInformation);

        let info = DatabaseInformation::new(read_meta(node)?);
        node.next_node()?;
        self.checker.check(&info, monitor)?;

        context.put(info);
        monitor.end(&Task::DatabaseInformation);
        Ok(())
    }
}

/// Parse the `meta` children; values come from the `value` attribute or,
/// failing that, the element text.
pub(crate) fn read_meta(node: &mut dyn NodeParser) -> Result<BTreeMap<String, String>> {
    check_start_node(node, database::NAME)?;
    let mut meta = BTreeMap::new();

    loop {
        node.next_node()?;
        if node.is_closed() {
            check_end_node(node, database::NAME)?;
            return Ok(meta);
        }

        check_start_node(node, database::META)?;
        let key = node.required_attribute(database::KEY)?.to_string();
        let value = match node.attribute(database::VALUE) {
            Some(value) => {
                let value = value.to_string();
                node.next_node()?;
                value
            }
            None => node.content_as_string()?.unwrap_or_default(),
        };
        check_end_node(node, database::META)?;
        meta.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::XmlNodeReader;
    use crate::progress::NoopProgressMonitor;

    fn info(entries: &[(&str, &str)]) -> DatabaseInformation {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_schema_version_gate() {
        let checker = SchemaVersionChecker::new(3);
        let monitor = NoopProgressMonitor;

        assert!(checker.check(&info(&[]), &monitor).is_ok());
        assert!(checker.check(&info(&[(keys::SCHEMA_VERSION, "3")]), &monitor).is_ok());

        let err = checker
            .check(&info(&[(keys::SCHEMA_VERSION, "4")]), &monitor)
            .unwrap_err();
        assert!(matches!(err, BackupError::Incompatible(_)));
        assert!(err.to_string().contains("(schema 4 > 3)"));
    }

    #[test]
    fn test_non_numeric_schema_version() {
        let checker = SchemaVersionChecker::new(3);
        let err = checker
            .check(&info(&[(keys::SCHEMA_VERSION, "three")]), &NoopProgressMonitor)
            .unwrap_err();
        assert!(matches!(err, BackupError::InvalidInformation { .. }));
    }

    #[test]
    fn test_read_meta_attribute_and_text() {
        let xml = r#"<backup><database-information><meta key="a" value="1"/><meta key="b">two</meta><meta key="c"></meta></database-information></backup>"#;
        let mut node = XmlNodeReader::new(xml.as_bytes()).unwrap();
        node.next_node().unwrap();

        let meta = read_meta(&mut node).unwrap();
        assert_eq!(meta.get("a").map(String::as_str), Some("1"));
        assert_eq!(meta.get("b").map(String::as_str), Some("two"));
        assert_eq!(meta.get("c").map(String::as_str), Some(""));
        assert!(node.is_closed());
        assert_eq!(node.name(), database::NAME);
    }

    #[test]
    fn test_read_meta_rejects_foreign_children() {
        let xml = r#"<backup><database-information><table name="x"/></database-information></backup>"#;
        let mut node = XmlNodeReader::new(xml.as_bytes()).unwrap();
        node.next_node().unwrap();

        let err = read_meta(&mut node).unwrap_err();
        assert!(err.to_string().contains("<table> is not named 'meta' as expected"));
    }
}
