//! Database drivers implementing the collaborator traits.
//!
//! - [`postgres`]: PostgreSQL on `deadpool-postgres`, with optional rustls TLS
//! - [`memory`]: in-process database for tests and dry runs

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::{PostgresDatabase, SslMode};
