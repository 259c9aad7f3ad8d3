//! Name mapping and table selection hooks.

use serde::{Deserialize, Serialize};

/// Maps document-level identifiers to target-database identifiers.
pub trait EntityNameProcessor: Send + Sync {
    fn table_name(&self, name: &str) -> String;
    fn column_name(&self, name: &str) -> String;
}

/// Case folding applied by [`CaseNameProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    #[default]
    Preserve,
    Upper,
    Lower,
}

/// Applies the same case folding to table and column names.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseNameProcessor {
    case: NameCase,
}

impl CaseNameProcessor {
    pub fn new(case: NameCase) -> Self {
        Self { case }
    }

    fn apply(&self, name: &str) -> String {
        match self.case {
            NameCase::Preserve => name.to_string(),
            NameCase::Upper => name.to_uppercase(),
            NameCase::Lower => name.to_lowercase(),
        }
    }
}

impl EntityNameProcessor for CaseNameProcessor {
    fn table_name(&self, name: &str) -> String {
        self.apply(name)
    }

    fn column_name(&self, name: &str) -> String {
        self.apply(name)
    }
}

/// Decides which live tables take part in an export.
pub trait TableSelector: Send + Sync {
    fn accept(&self, table: &str) -> bool;
}

impl<F> TableSelector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn accept(&self, table: &str) -> bool {
        self(table)
    }
}

/// Accepts every table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllTables;

impl TableSelector for AllTables {
    fn accept(&self, _table: &str) -> bool {
        true
    }
}

/// Accepts tables whose name starts with a prefix, ignoring case.
#[derive(Debug, Clone)]
pub struct PrefixTableSelector {
    prefix: String,
}

impl PrefixTableSelector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
        }
    }
}

impl TableSelector for PrefixTableSelector {
    fn accept(&self, table: &str) -> bool {
        table.to_lowercase().starts_with(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_processor() {
        let upper = CaseNameProcessor::new(NameCase::Upper);
        assert_eq!(upper.table_name("ao_book"), "AO_BOOK");
        assert_eq!(upper.column_name("title"), "TITLE");

        let preserve = CaseNameProcessor::default();
        assert_eq!(preserve.table_name("Ao_Book"), "Ao_Book");
    }

    #[test]
    fn test_prefix_selector_ignores_case() {
        let selector = PrefixTableSelector::new("AO_");
        assert!(selector.accept("AO_BOOK"));
        assert!(selector.accept("ao_book"));
        assert!(!selector.accept("JIRAISSUE"));
    }

    #[test]
    fn test_closure_selector() {
        let selector = |name: &str| name.len() > 3;
        assert!(selector.accept("LONG"));
        assert!(!TableSelector::accept(&selector, "ABC"));
        assert!(AllTables.accept("anything"));
    }
}
