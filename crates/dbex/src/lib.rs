//! # dbex
//!
//! Streaming backup and restore of relational tables through a portable XML
//! document.
//!
//! A backup holds three sections under one root: database metadata, table
//! definitions and table data. Export walks a live database and writes the
//! document in a single pass; import reads it back in a single pass,
//! recreates the tables and loads the rows in batches, with vendor-specific
//! hooks wrapped around the load.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbex::{Backup, Config};
//!
//! #[tokio::main]
//! async fn main() -> dbex::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let backup = Backup::connect(&config).await?;
//!
//!     let file = std::fs::File::create("backup.xml")?;
//!     backup.save(std::io::BufWriter::new(file)).await?;
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod export;
pub mod hooks;
pub mod import;
pub mod node;
pub mod progress;

pub use backup::{inspect, Backup, Inventory, TableSummary};
pub use config::{BackupConfig, Config, DatabaseConfig};
pub use error::{BackupError, Result};
pub use import::BatchMode;
pub use progress::{LogProgressMonitor, NoopProgressMonitor, ProgressMonitor, Task};
