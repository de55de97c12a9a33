pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod migrate;
pub mod transport;
pub mod util;

pub use error::MigrateError;
pub use migrate::{MigrationEngine, MigrationResult};
pub use transport::{HttpTransport, Transport};
