//! Batch pipeline: extract, transform, validate, then persist to file and (optionally) a database

pub mod classify;
pub mod extract;
pub mod transform;
pub mod validate;

use crate::config::EtlConfig;
use crate::error::Result;
use crate::metrics::{time_stage, EtlMetrics};
use crate::report::group_thousands;
use crate::sink::{default_database_sink, write_csv, DatabaseSink, FileSinkSummary, SinkOutcome};
use classify::{ColumnClassifier, NameSubstringClassifier};
use polars::prelude::DataFrame;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use transform::{TransformStats, Transformed, Transformer};
use validate::{ValidationReport, Validator};

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub rows_in: usize,
    pub rows_out: usize,
    pub transform: TransformStats,
    pub validation: ValidationReport,
    pub file: FileSinkSummary,
    /// `None` when the database stage is disabled in configuration
    pub database: Option<SinkOutcome>,
    pub duration: Duration,
}

pub struct Pipeline {
    config: EtlConfig,
    classifier: Arc<dyn ColumnClassifier>,
    /// Replaces the sink built from configuration when set
    database_sink: Option<Box<dyn DatabaseSink>>,
}

impl Pipeline {
    pub fn new(config: EtlConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(NameSubstringClassifier::new()),
            database_sink: None,
        }
    }

    /// Swap the column classifier. The configured database sink picks its primary key with it too.
    pub fn with_classifier(mut self, classifier: Arc<dyn ColumnClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_database_sink(mut self, sink: Box<dyn DatabaseSink>) -> Self {
        self.database_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn extract(&self) -> Result<DataFrame> {
        info!("📥 Extracting {}", self.config.raw_dataset.display());
        println!("📥 Extracting data from {}...", self.config.raw_dataset.display());
        let frame = extract::load_csv(&self.config.raw_dataset)?;
        println!(
            "✅ Loaded {} rows, {} columns",
            group_thousands(frame.height()),
            frame.width()
        );
        Ok(frame)
    }

    pub fn transform(&self, raw: DataFrame) -> Result<Transformed> {
        println!("🔧 Transforming data...");
        let transformer = Transformer::new(
            self.classifier.clone(),
            self.config.status_keywords.keywords(),
        );
        let transformed = transformer.transform(raw)?;

        let stats = &transformed.stats;
        println!("   Missing values before cleaning: {}", stats.missing_before);
        if stats.dropped_missing_id > 0 {
            println!(
                "   Dropped {} rows with missing {}",
                stats.dropped_missing_id,
                stats.identifier_column.as_deref().unwrap_or("identifier")
            );
        }
        if let Some(column) = &stats.time_features_from {
            println!("   Derived time features from {column}");
        }
        if let Some(column) = &stats.status_flags_from {
            println!("   Derived delivery flags from {column}");
        }
        if stats.duplicates_removed > 0 {
            println!("   Removed {} duplicate rows", stats.duplicates_removed);
        }
        println!("✅ Transformation complete: {} rows", group_thousands(stats.final_rows));
        Ok(transformed)
    }

    pub fn validate(&self, frame: &DataFrame) -> ValidationReport {
        println!("🔍 Validating data quality...");
        let report = Validator::new(self.classifier.clone(), self.config.kpi.clone()).validate(frame);

        if let (Some(column), Some(ratio)) = (&report.identifier_column, report.identifier_unique_ratio) {
            println!("   {column} unique ratio: {:.2}%", ratio * 100.0);
        }
        println!("   Missing values: {:.2}%", report.missing_percent);
        if let Some(rate) = report.on_time_rate {
            let marker = if report.below_on_time_target() { "⚠️ " } else { "" };
            println!(
                "   {marker}On-time rate: {:.2}% (target {:.0}%)",
                rate * 100.0,
                report.on_time_target * 100.0
            );
        }
        println!("✅ Validation complete");
        report
    }

    pub fn save_to_file(&self, frame: &DataFrame) -> Result<FileSinkSummary> {
        println!("💾 Saving to {}...", self.config.processed_dataset.display());
        let summary = write_csv(frame, &self.config.processed_dataset)?;
        println!(
            "✅ Saved {} rows ({:.1} KB)",
            group_thousands(summary.rows),
            summary.size_kb()
        );
        Ok(summary)
    }

    /// Best-effort load; a failure is reported in the outcome and logged, never returned as an error.
    #[instrument(skip_all)]
    pub async fn save_to_database(&self, frame: &DataFrame) -> SinkOutcome {
        println!("🗄️  Loading into database...");
        let configured;
        let sink: &dyn DatabaseSink = match &self.database_sink {
            Some(sink) => sink.as_ref(),
            None => {
                configured = default_database_sink(&self.config.database, self.classifier.clone());
                configured.as_ref()
            }
        };
        debug!(sink = sink.name(), "Database sink selected");
        let outcome = {
            let _timing = time_stage("save_database");
            sink.load(frame).await
        };
        EtlMetrics::record_database_load(outcome.label());

        match &outcome {
            SinkOutcome::Succeeded { rows } => {
                info!(rows, "Database load complete");
                println!("✅ Loaded {} rows into database", group_thousands(*rows as usize));
            }
            SinkOutcome::Skipped { reason } => {
                info!("Database load skipped: {}", reason);
                println!("⏭️  Database load skipped: {reason}");
            }
            SinkOutcome::Failed { message } => {
                warn!("Database load failed: {}", message);
                println!("⚠️  Database load failed: {message}");
            }
        }
        outcome
    }

    /// Transform, validate and persist an already-loaded table.
    pub async fn process(&self, raw: DataFrame) -> Result<PipelineResult> {
        let started = Instant::now();
        let rows_in = raw.height();

        let Transformed { frame, stats } = self.transform(raw)?;
        let validation = self.validate(&frame);
        let file = self.save_to_file(&frame)?;

        let database = if self.config.load_database {
            Some(self.save_to_database(&frame).await)
        } else {
            info!("Database stage disabled");
            None
        };

        Ok(PipelineResult {
            rows_in,
            rows_out: frame.height(),
            transform: stats,
            validation,
            file,
            database,
            duration: started.elapsed(),
        })
    }

    /// Run the complete pipeline from the configured raw dataset.
    #[instrument(skip(self), fields(source = %self.config.raw_dataset.display()))]
    pub async fn run(&self) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("🚀 Starting delivery ETL pipeline");
        println!("🚀 Starting delivery ETL pipeline");

        let raw = self.extract()?;
        let mut result = self.process(raw).await?;
        result.duration = started.elapsed();

        info!(
            rows_in = result.rows_in,
            rows_out = result.rows_out,
            duration_secs = result.duration.as_secs_f64(),
            "Pipeline finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use polars::prelude::*;
    use tempfile::tempdir;

    struct FixedOutcome(SinkOutcome);

    #[async_trait]
    impl DatabaseSink for FixedOutcome {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn load(&self, _frame: &DataFrame) -> SinkOutcome {
            self.0.clone()
        }
    }

    fn raw() -> DataFrame {
        df!(
            "Order_ID" => ["A1", "A1", "B2"],
            "Agent_Age" => [Some(30i64), Some(30), None]
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_process_writes_file_and_reports_sink_outcome() {
        let dir = tempdir().unwrap();
        let config = EtlConfig {
            processed_dataset: dir.path().join("out.csv"),
            ..EtlConfig::default()
        };
        let pipeline = Pipeline::new(config)
            .with_database_sink(Box::new(FixedOutcome(SinkOutcome::Succeeded { rows: 2 })));

        let result = pipeline.process(raw()).await.unwrap();

        assert_eq!(result.rows_in, 3);
        assert_eq!(result.rows_out, 2);
        assert_eq!(result.transform.duplicates_removed, 1);
        assert_eq!(result.file.rows, 2);
        assert_eq!(result.database, Some(SinkOutcome::Succeeded { rows: 2 }));
        assert!(dir.path().join("out.csv").exists());
    }

    #[tokio::test]
    async fn test_custom_classifier_changes_identifier() {
        let dir = tempdir().unwrap();
        let config = EtlConfig {
            processed_dataset: dir.path().join("out.csv"),
            load_database: false,
            ..EtlConfig::default()
        };
        let classifier = |name: &str| {
            (name == "Agent_Age").then_some(classify::ColumnRole::Identifier)
        };
        let pipeline = Pipeline::new(config).with_classifier(Arc::new(classifier));

        let result = pipeline.process(raw()).await.unwrap();

        assert_eq!(result.transform.identifier_column.as_deref(), Some("Agent_Age"));
        assert_eq!(result.transform.dropped_missing_id, 1);
        assert_eq!(result.database, None);
    }

    #[tokio::test]
    async fn test_custom_sink_survives_later_classifier_swap() {
        let dir = tempdir().unwrap();
        let config = EtlConfig {
            processed_dataset: dir.path().join("out.csv"),
            ..EtlConfig::default()
        };
        let classifier = |name: &str| (name == "Order_ID").then_some(classify::ColumnRole::Identifier);
        let pipeline = Pipeline::new(config)
            .with_database_sink(Box::new(FixedOutcome(SinkOutcome::Succeeded { rows: 2 })))
            .with_classifier(Arc::new(classifier));

        let result = pipeline.process(raw()).await.unwrap();

        assert_eq!(result.database, Some(SinkOutcome::Succeeded { rows: 2 }));
    }
}
