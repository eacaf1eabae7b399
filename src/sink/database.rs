//! Optional relational sink.
//!
//! The database stage is best-effort: every implementation reports an explicit [`SinkOutcome`] instead of
//! returning an error, and the pipeline's success never depends on it.

use crate::config::DbConfig;
use crate::error::Result;
use crate::frame::column_names;
use crate::pipeline::classify::ColumnClassifier;
use async_trait::async_trait;
use polars::prelude::{DataFrame, DataType};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Succeeded { rows: u64 },
    Skipped { reason: String },
    Failed { message: String },
}

impl SinkOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SinkOutcome::Succeeded { .. } => "succeeded",
            SinkOutcome::Skipped { .. } => "skipped",
            SinkOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkOutcome::Succeeded { rows } => write!(f, "loaded {rows} rows"),
            SinkOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            SinkOutcome::Failed { message } => write!(f, "failed: {message}"),
        }
    }
}

#[async_trait]
pub trait DatabaseSink: Send + Sync {
    fn name(&self) -> &str;

    /// Replace the destination table with `frame`'s rows.
    async fn load(&self, frame: &DataFrame) -> SinkOutcome;
}

/// Stand-in used when the crate is built without a database driver
#[derive(Debug, Default)]
pub struct DriverUnavailable;

#[async_trait]
impl DatabaseSink for DriverUnavailable {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn load(&self, _frame: &DataFrame) -> SinkOutcome {
        SinkOutcome::Skipped {
            reason: "database driver not available (build with the `db` feature)".to_string(),
        }
    }
}

/// The PostgreSQL sink when the `db` feature is on, otherwise [`DriverUnavailable`].
pub fn default_database_sink(
    config: &DbConfig,
    classifier: Arc<dyn ColumnClassifier>,
) -> Box<dyn DatabaseSink> {
    #[cfg(feature = "db")]
    {
        Box::new(super::postgres::PostgresSink::new(config.clone(), classifier))
    }
    #[cfg(not(feature = "db"))]
    {
        let _ = (config, classifier);
        Box::new(DriverUnavailable)
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map a load attempt to its outcome. The row count read back must match what was sent.
pub fn load_outcome(table_name: &str, expected: u64, result: Result<u64>) -> SinkOutcome {
    match result {
        Ok(rows) if rows == expected => SinkOutcome::Succeeded { rows },
        Ok(rows) => SinkOutcome::Failed {
            message: format!("verification found {rows} rows in {table_name}, expected {expected}"),
        },
        Err(e) => SinkOutcome::Failed {
            message: e.to_string(),
        },
    }
}

pub fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        d if d.is_integer() => "BIGINT",
        d if d.is_float() => "DOUBLE PRECISION",
        DataType::Boolean => "BOOLEAN",
        DataType::Datetime(_, _) => "TIMESTAMP",
        _ => "TEXT",
    }
}

/// `CREATE TABLE` with one column per frame column, an optional primary key and an insertion timestamp.
pub fn create_table_sql(table_name: &str, frame: &DataFrame, primary_key: Option<&str>) -> String {
    let mut definitions: Vec<String> = frame
        .get_columns()
        .iter()
        .map(|column| {
            let name = column.name().as_str();
            let mut definition = format!("{} {}", quote_ident(name), sql_type(column.dtype()));
            if primary_key == Some(name) {
                definition.push_str(" PRIMARY KEY");
            }
            definition
        })
        .collect();

    if !column_names(frame).contains(&"created_at") {
        definitions.push("created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(table_name),
        definitions.join(",\n    ")
    )
}

/// Parameterised single-row `INSERT` covering every frame column.
pub fn insert_sql(table_name: &str, frame: &DataFrame) -> String {
    let columns: Vec<String> = column_names(frame).into_iter().map(quote_ident).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table_name),
        columns.join(", "),
        placeholders.join(", ")
    )
}
