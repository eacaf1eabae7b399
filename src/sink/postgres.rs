use super::database::{create_table_sql, insert_sql, load_outcome, quote_ident, DatabaseSink, SinkOutcome};
use crate::config::DbConfig;
use crate::constants::{DB_CONNECT_TIMEOUT_SECS, DELIVERIES_TABLE};
use crate::error::Result;
use crate::frame::column_names;
use crate::pipeline::classify::{ColumnClassifier, ColumnRole};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

type SqlParam = Box<dyn ToSql + Sync + Send>;

/// One frame column pulled out into driver-friendly values
enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    fn from_column(column: &Column) -> PolarsResult<Self> {
        let series = column.as_materialized_series();
        let dtype = series.dtype();
        Ok(if dtype.is_integer() {
            Self::Int(series.cast(&DataType::Int64)?.i64()?.into_iter().collect())
        } else if dtype.is_float() {
            Self::Float(series.cast(&DataType::Float64)?.f64()?.into_iter().collect())
        } else if let DataType::Boolean = dtype {
            Self::Bool(series.bool()?.into_iter().collect())
        } else if let DataType::Datetime(_, _) = dtype {
            Self::Timestamp(series.datetime()?.as_datetime_iter().collect())
        } else {
            let text = series.cast(&DataType::String)?;
            Self::Text(text.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
        })
    }

    fn param(&self, row: usize) -> SqlParam {
        match self {
            Self::Int(values) => Box::new(values[row]),
            Self::Float(values) => Box::new(values[row]),
            Self::Bool(values) => Box::new(values[row]),
            Self::Timestamp(values) => Box::new(values[row]),
            Self::Text(values) => Box::new(values[row].clone()),
        }
    }
}

/// Drop-and-recreate loader for PostgreSQL
pub struct PostgresSink {
    config: DbConfig,
    table_name: String,
    classifier: Arc<dyn ColumnClassifier>,
}

impl PostgresSink {
    pub fn new(config: DbConfig, classifier: Arc<dyn ColumnClassifier>) -> Self {
        Self {
            config,
            table_name: DELIVERIES_TABLE.to_string(),
            classifier,
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Connect, load, verify, and close the connection whatever the result.
    async fn try_load(&self, frame: &DataFrame) -> Result<u64> {
        info!(
            "Connecting to {}:{}/{}",
            self.config.host, self.config.port, self.config.database
        );
        let (mut client, connection) = tokio_postgres::Config::new()
            .host(&self.config.host)
            .port(self.config.port)
            .dbname(&self.config.database)
            .user(&self.config.user)
            .password(&self.config.password)
            .connect_timeout(Duration::from_secs(DB_CONNECT_TIMEOUT_SECS))
            .connect(NoTls)
            .await?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection error: {}", e);
            }
        });

        let result = self.write_frame(&mut client, frame).await;
        drop(client);
        let _ = driver.await;
        result
    }

    async fn write_frame(&self, client: &mut Client, frame: &DataFrame) -> Result<u64> {
        let target = quote_ident(&self.table_name);

        debug!("Dropping {} if it exists", target);
        client
            .batch_execute(&format!("DROP TABLE IF EXISTS {target} CASCADE"))
            .await?;

        let primary_key = self
            .classifier
            .first_with_role(&column_names(frame), ColumnRole::Identifier)
            .map(str::to_string);
        client
            .batch_execute(&create_table_sql(&self.table_name, frame, primary_key.as_deref()))
            .await?;
        info!("Created table {}", target);

        let columns = frame
            .get_columns()
            .iter()
            .map(ColumnValues::from_column)
            .collect::<PolarsResult<Vec<_>>>()?;

        let transaction = client.transaction().await?;
        let statement = transaction.prepare(&insert_sql(&self.table_name, frame)).await?;
        for row in 0..frame.height() {
            let params: Vec<SqlParam> = columns.iter().map(|c| c.param(row)).collect();
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            transaction.execute(&statement, &refs).await?;
        }
        transaction.commit().await?;
        info!("Inserted {} rows", frame.height());

        let count: i64 = client
            .query_one(&format!("SELECT COUNT(*) FROM {target}"), &[])
            .await?
            .get(0);
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl DatabaseSink for PostgresSink {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn load(&self, frame: &DataFrame) -> SinkOutcome {
        let expected = frame.height() as u64;
        load_outcome(&self.table_name, expected, self.try_load(frame).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::NameSubstringClassifier;
    use std::net::TcpListener;

    fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_unreachable_server_is_failed_outcome() {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: closed_port(),
            ..DbConfig::default()
        };
        let sink = PostgresSink::new(config, Arc::new(NameSubstringClassifier::new()));
        let frame = df!("order_id" => ["A1"]).unwrap();

        let outcome = sink.load(&frame).await;

        assert!(matches!(outcome, SinkOutcome::Failed { .. }), "{outcome:?}");
    }

    #[test]
    fn test_column_values_follow_dtypes() {
        let frame = df!(
            "id" => [Some(1i32), None],
            "flag" => [Some(true), None],
            "note" => [Some("x"), None]
        )
        .unwrap();
        let columns: Vec<ColumnValues> = frame
            .get_columns()
            .iter()
            .map(|c| ColumnValues::from_column(c).unwrap())
            .collect();

        assert!(matches!(&columns[0], ColumnValues::Int(v) if v == &vec![Some(1), None]));
        assert!(matches!(&columns[1], ColumnValues::Bool(v) if v == &vec![Some(true), None]));
        assert!(matches!(&columns[2], ColumnValues::Text(v) if v == &vec![Some("x".to_string()), None]));
    }
}
