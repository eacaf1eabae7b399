//! Pipeline metrics
//!
//! Counters and histograms go through the `metrics` facade. Nothing is recorded unless the embedding
//! process installs a recorder.

pub mod core;

pub use self::core::{time_stage, TimingGuard};

pub const STAGE_DURATION_SECONDS: &str = "etl_stage_duration_seconds";
pub const ROWS_LOADED_TOTAL: &str = "etl_rows_loaded_total";
pub const ROWS_DROPPED_MISSING_ID_TOTAL: &str = "etl_rows_dropped_missing_id_total";
pub const DUPLICATES_REMOVED_TOTAL: &str = "etl_duplicates_removed_total";
pub const UNPARSEABLE_DATES_TOTAL: &str = "etl_unparseable_dates_total";
pub const ROWS_WRITTEN_TOTAL: &str = "etl_rows_written_total";
pub const DATABASE_LOADS_TOTAL: &str = "etl_database_loads_total";
pub const MISSING_PERCENT: &str = "etl_missing_percent";

/// Metrics emitted by the pipeline stages
pub struct EtlMetrics;

impl EtlMetrics {
    pub fn record_rows_loaded(rows: usize) {
        ::metrics::counter!(ROWS_LOADED_TOTAL).increment(rows as u64);
    }

    pub fn record_transform(dropped_missing_id: usize, unparseable_dates: usize, duplicates: usize) {
        ::metrics::counter!(ROWS_DROPPED_MISSING_ID_TOTAL).increment(dropped_missing_id as u64);
        ::metrics::counter!(UNPARSEABLE_DATES_TOTAL).increment(unparseable_dates as u64);
        ::metrics::counter!(DUPLICATES_REMOVED_TOTAL).increment(duplicates as u64);
    }

    pub fn record_missing_percent(percent: f64) {
        ::metrics::gauge!(MISSING_PERCENT).set(percent);
    }

    pub fn record_rows_written(rows: usize) {
        ::metrics::counter!(ROWS_WRITTEN_TOTAL).increment(rows as u64);
    }

    /// `outcome` is one of `succeeded`, `skipped`, `failed`
    pub fn record_database_load(outcome: &'static str) {
        ::metrics::counter!(DATABASE_LOADS_TOTAL, "outcome" => outcome).increment(1);
    }
}
