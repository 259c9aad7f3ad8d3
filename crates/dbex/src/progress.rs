//! Progress reporting for export and import runs.

use std::fmt;

use tracing::{debug, info};

/// Unit of work reported through [`ProgressMonitor::begin`] and [`ProgressMonitor::end`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    DatabaseInformation,
    TableDefinition,
    TableCreation,
    TablesData,
    TableData(String),
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::DatabaseInformation => f.write_str("database information"),
            Task::TableDefinition => f.write_str("table definitions"),
            Task::TableCreation => f.write_str("table creation"),
            Task::TablesData => f.write_str("table data"),
            Task::TableData(table) => write!(f, "data of table {}", table),
        }
    }
}

/// Observer of a run. Notification failures never abort the run, so the
/// methods are infallible.
pub trait ProgressMonitor: Send + Sync {
    fn begin(&self, task: &Task);

    fn end(&self, task: &Task);

    fn total_number_of_tables(&self, total: usize);

    fn update(&self, message: &str);
}

/// Reports progress as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressMonitor;

impl ProgressMonitor for LogProgressMonitor {
    fn begin(&self, task: &Task) {
        debug!("Starting {}", task);
    }

    fn end(&self, task: &Task) {
        debug!("Finished {}", task);
    }

    fn total_number_of_tables(&self, total: usize) {
        info!("{} tables to process", total);
    }

    fn update(&self, message: &str) {
        info!("{}", message);
    }
}

/// Discards all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgressMonitor;

impl ProgressMonitor for NoopProgressMonitor {
    fn begin(&self, _task: &Task) {}

    fn end(&self, _task: &Task) {}

    fn total_number_of_tables(&self, _total: usize) {}

    fn update(&self, _message: &str) {}
}
