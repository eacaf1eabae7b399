use anyhow::Result;
use async_trait::async_trait;
use delivery_etl::config::EtlConfig;
use delivery_etl::constants::{IS_DELIVERED, IS_LATE, IS_ON_TIME, ORDER_DAY_NAME, ORDER_DAY_OF_WEEK};
use delivery_etl::error::EtlError;
use delivery_etl::frame::{missing_cells, render_column};
use delivery_etl::pipeline::extract::load_csv;
use delivery_etl::pipeline::Pipeline;
use delivery_etl::sink::{DatabaseSink, DriverUnavailable, SinkOutcome};
use polars::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const RAW_CSV: &str = "\
Order_ID,Agent_Age,Agent_Rating,Order_Date,Weather,Delivery_Status
A1,30,4.0,2022-03-19,Sunny,Delivered On Time
A1,30,4.0,2022-03-19,Sunny,Delivered On Time
B2,,4.5,2022-03-20,,Delivered Late
C3,25,,2022-03-21,Cloudy,Pending
,40,4.0,2022-03-22,Fog,Late
D4,35,5.0,2022-03-23,Stormy,Delivered
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Result<Self> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("raw"))?;
        fs::write(dir.path().join("raw").join("orders.csv"), RAW_CSV)?;
        Ok(Self { dir })
    }

    fn config(&self) -> EtlConfig {
        EtlConfig {
            raw_dataset: self.dir.path().join("raw").join("orders.csv"),
            processed_dataset: self.dir.path().join("processed").join("orders_clean.csv"),
            ..EtlConfig::default()
        }
    }

    fn output(&self) -> std::path::PathBuf {
        self.dir.path().join("processed").join("orders_clean.csv")
    }
}

struct FailingSink;

#[async_trait]
impl DatabaseSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn load(&self, _frame: &DataFrame) -> SinkOutcome {
        SinkOutcome::Failed {
            message: "connection refused".to_string(),
        }
    }
}

fn int_column(frame: &DataFrame, name: &str) -> Vec<i64> {
    let column = frame.column(name).unwrap();
    column.i64().unwrap().into_iter().map(|v| v.unwrap_or(-1)).collect()
}

fn text_column(frame: &DataFrame, name: &str) -> Vec<String> {
    render_column(frame.column(name).unwrap())
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_absent_source_fails_without_output() -> Result<()> {
    let dir = tempdir()?;
    let config = EtlConfig {
        raw_dataset: dir.path().join("missing.csv"),
        processed_dataset: dir.path().join("out.csv"),
        ..EtlConfig::default()
    };

    let result = Pipeline::new(config).run().await;

    assert!(matches!(result, Err(EtlError::SourceNotFound { .. })));
    assert!(!dir.path().join("out.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_full_run_without_driver_skips_database() -> Result<()> {
    let workspace = Workspace::new()?;
    let pipeline = Pipeline::new(workspace.config()).with_database_sink(Box::new(DriverUnavailable));

    let result = pipeline.run().await?;

    assert_eq!(result.rows_in, 6);
    assert_eq!(result.rows_out, 4);
    assert_eq!(result.transform.dropped_missing_id, 1);
    assert_eq!(result.transform.duplicates_removed, 1);
    assert!(matches!(result.database, Some(SinkOutcome::Skipped { .. })));
    assert!(workspace.output().exists());

    let output = load_csv(&workspace.output())?;
    assert_eq!(output.height(), 4);
    assert_eq!(text_column(&output, "Order_ID"), vec!["A1", "B2", "C3", "D4"]);
    assert_eq!(int_column(&output, IS_DELIVERED), vec![1, 1, 0, 1]);
    assert_eq!(int_column(&output, IS_LATE), vec![0, 1, 0, 0]);
    assert_eq!(int_column(&output, IS_ON_TIME), vec![1, 0, 0, 1]);
    // 2022-03-19 was a Saturday
    assert_eq!(int_column(&output, ORDER_DAY_OF_WEEK)[0], 5);
    assert_eq!(text_column(&output, ORDER_DAY_NAME)[0], "Saturday");
    Ok(())
}

#[tokio::test]
async fn test_output_has_no_missing_values_or_duplicates() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut config = workspace.config();
    config.load_database = false;

    Pipeline::new(config).run().await?;

    let output = load_csv(&workspace.output())?;
    assert_eq!(missing_cells(&output), 0);
    assert!(!output.is_duplicated()?.any());

    // Median fill for numbers, sentinel for text
    assert_eq!(text_column(&output, "Agent_Age")[1], "30");
    assert_eq!(text_column(&output, "Agent_Rating")[2], "4.25");
    assert_eq!(text_column(&output, "Weather")[1], "Unknown");

    let delivered = int_column(&output, IS_DELIVERED);
    let late = int_column(&output, IS_LATE);
    for (row, on_time) in int_column(&output, IS_ON_TIME).into_iter().enumerate() {
        if on_time == 1 {
            assert_eq!((delivered[row], late[row]), (1, 0));
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_database_failure_does_not_fail_run() -> Result<()> {
    let workspace = Workspace::new()?;
    let pipeline = Pipeline::new(workspace.config()).with_database_sink(Box::new(FailingSink));

    let result = pipeline.run().await?;

    assert_eq!(
        result.database,
        Some(SinkOutcome::Failed {
            message: "connection refused".to_string()
        })
    );
    assert_eq!(load_csv(&workspace.output())?.height(), 4);
    Ok(())
}

#[tokio::test]
async fn test_disabled_database_stage_is_not_attempted() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut config = workspace.config();
    config.load_database = false;

    let result = Pipeline::new(config)
        .with_database_sink(Box::new(FailingSink))
        .run()
        .await?;

    assert_eq!(result.database, None);
    Ok(())
}

#[tokio::test]
async fn test_rerunning_on_output_is_idempotent() -> Result<()> {
    let workspace = Workspace::new()?;
    let mut config = workspace.config();
    config.load_database = false;
    Pipeline::new(config).run().await?;
    let first = fs::read_to_string(workspace.output())?;

    let second_path = workspace.dir.path().join("second.csv");
    let rerun = EtlConfig {
        raw_dataset: workspace.output(),
        processed_dataset: second_path.clone(),
        load_database: false,
        ..EtlConfig::default()
    };
    let result = Pipeline::new(rerun).run().await?;

    assert_eq!(result.transform.dropped_missing_id, 0);
    assert_eq!(result.transform.duplicates_removed, 0);
    assert_eq!(fs::read_to_string(Path::new(&second_path))?, first);
    Ok(())
}
