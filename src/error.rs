use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Raw dataset not found at {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

impl EtlError {
    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        EtlError::WriteFailure {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
