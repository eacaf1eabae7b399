//! Terminal stages that persist the cleaned table

pub mod csv_file;
pub mod database;
#[cfg(feature = "db")]
pub mod postgres;

pub use csv_file::{write_csv, FileSinkSummary};
pub use database::{default_database_sink, DatabaseSink, DriverUnavailable, SinkOutcome};
