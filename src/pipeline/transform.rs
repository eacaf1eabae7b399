//! Cleaning and feature derivation.
//!
//! Steps run in a fixed order, each one feeding the next:
//! 1. drop rows missing the first identifier-like column
//! 2. fill missing values (median for numeric columns, sentinel otherwise)
//! 3. parse every date-like column into timestamps
//! 4. derive year/month/weekday features from the first date-like column
//! 5. derive delivery flags from the first status-like column
//! 6. drop fully duplicate rows, keeping the first occurrence

use crate::constants::{
    DELIVERED_KEYWORDS, IS_DELIVERED, IS_LATE, IS_ON_TIME, LATE_KEYWORDS, MISSING_SENTINEL,
    ORDER_DAY_NAME, ORDER_DAY_OF_WEEK, ORDER_MONTH, ORDER_YEAR,
};
use crate::error::Result;
use crate::frame::{column_names, missing_cells, timestamp_series};
use crate::metrics::{time_stage, EtlMetrics};
use crate::pipeline::classify::{ColumnClassifier, ColumnRole};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use polars::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

// Month-first wins when both readings are valid
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse a timestamp, accepting RFC 3339 and a handful of common date layouts.
///
/// Offsets are dropped and the wall-clock time is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Keyword sets for delivery flags, matched as substrings of the lower-cased status text.
///
/// Matching is by any occurrence, so "late fee" counts as late.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusKeywords {
    delivered: Vec<String>,
    late: Vec<String>,
}

impl StatusKeywords {
    pub fn new<S: AsRef<str>>(delivered: &[S], late: &[S]) -> Self {
        let lower = |words: &[S]| -> Vec<String> {
            words.iter().map(|w| w.as_ref().to_lowercase()).collect()
        };
        Self {
            delivered: lower(delivered),
            late: lower(late),
        }
    }

    pub fn delivered(&self) -> &[String] {
        &self.delivered
    }

    pub fn late(&self) -> &[String] {
        &self.late
    }
}

impl Default for StatusKeywords {
    fn default() -> Self {
        Self::new(DELIVERED_KEYWORDS, LATE_KEYWORDS)
    }
}

/// Counters describing one transform run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformStats {
    pub initial_rows: usize,
    pub missing_before: usize,
    pub identifier_column: Option<String>,
    pub dropped_missing_id: usize,
    pub missing_after_fill: usize,
    pub date_columns: Vec<String>,
    pub unparseable_dates: usize,
    pub time_features_from: Option<String>,
    pub status_flags_from: Option<String>,
    pub duplicates_removed: usize,
    pub final_rows: usize,
}

#[derive(Debug, Clone)]
pub struct Transformed {
    pub frame: DataFrame,
    pub stats: TransformStats,
}

/// Column names picked for each role at the start of a transform
struct Roles {
    identifier: Option<String>,
    dates: Vec<String>,
    status: Option<String>,
}

pub struct Transformer {
    classifier: Arc<dyn ColumnClassifier>,
    keywords: StatusKeywords,
}

impl Transformer {
    pub fn new(classifier: Arc<dyn ColumnClassifier>, keywords: StatusKeywords) -> Self {
        Self {
            classifier,
            keywords,
        }
    }

    fn roles(&self, frame: &DataFrame) -> Roles {
        let names = column_names(frame);
        let owned = |c: Option<&str>| c.map(str::to_string);
        Roles {
            identifier: owned(self.classifier.first_with_role(&names, ColumnRole::Identifier)),
            dates: self
                .classifier
                .columns_with_role(&names, ColumnRole::Date)
                .into_iter()
                .map(str::to_string)
                .collect(),
            status: owned(self.classifier.first_with_role(&names, ColumnRole::Status)),
        }
    }

    /// Clean and enrich `raw`, returning the new frame and what happened to it.
    #[instrument(skip_all, fields(rows = raw.height(), columns = raw.width()))]
    pub fn transform(&self, raw: DataFrame) -> Result<Transformed> {
        let _timing = time_stage("transform");
        let roles = self.roles(&raw);
        let mut stats = TransformStats {
            initial_rows: raw.height(),
            missing_before: missing_cells(&raw),
            identifier_column: roles.identifier.clone(),
            date_columns: roles.dates.clone(),
            ..Default::default()
        };

        let mut frame = match &roles.identifier {
            Some(column) => {
                let (frame, dropped) = drop_missing(raw, column)?;
                stats.dropped_missing_id = dropped;
                debug!("Dropped {} rows with missing '{}'", dropped, column);
                frame
            }
            None => raw,
        };

        frame = fill_missing(&frame)?;
        stats.missing_after_fill = missing_cells(&frame);

        for column in &roles.dates {
            stats.unparseable_dates += parse_dates(&mut frame, column)?;
        }

        if let Some(column) = roles.dates.first() {
            derive_time_features(&mut frame, column)?;
            stats.time_features_from = Some(column.clone());
        }

        if let Some(column) = &roles.status {
            frame = self.derive_status_flags(frame, column)?;
            stats.status_flags_from = Some(column.clone());
        }

        let (frame, duplicates) = drop_duplicates(frame)?;
        stats.duplicates_removed = duplicates;
        stats.final_rows = frame.height();

        EtlMetrics::record_transform(
            stats.dropped_missing_id,
            stats.unparseable_dates,
            stats.duplicates_removed,
        );
        info!(
            initial_rows = stats.initial_rows,
            final_rows = stats.final_rows,
            duplicates = stats.duplicates_removed,
            "Transform complete"
        );

        Ok(Transformed { frame, stats })
    }

    fn derive_status_flags(&self, frame: DataFrame, column: &str) -> Result<DataFrame> {
        let status = col(column).cast(DataType::String).str().to_lowercase();
        let matches_any = |keywords: &[String]| -> Expr {
            keywords
                .iter()
                .map(|k| status.clone().str().contains_literal(lit(k.clone())))
                .reduce(|a, b| a.or(b))
                .unwrap_or_else(|| lit(false))
                .fill_null(lit(false))
        };
        let delivered = matches_any(self.keywords.delivered());
        let late = matches_any(self.keywords.late());

        let frame = frame
            .lazy()
            .with_columns([
                delivered.clone().cast(DataType::Int64).alias(IS_DELIVERED),
                late.clone().cast(DataType::Int64).alias(IS_LATE),
                delivered.and(late.not()).cast(DataType::Int64).alias(IS_ON_TIME),
            ])
            .collect()?;
        Ok(frame)
    }
}

fn drop_missing(frame: DataFrame, column: &str) -> Result<(DataFrame, usize)> {
    let present = frame.column(column)?.as_materialized_series().is_not_null();
    let kept = frame.filter(&present)?;
    let dropped = frame.height() - kept.height();
    Ok((kept, dropped))
}

fn sentinel_series(name: PlSmallStr, len: usize) -> Series {
    Series::new(name, vec![MISSING_SENTINEL; len])
}

fn fill_series(series: &Series) -> PolarsResult<Series> {
    let name = series.name().clone();
    let dtype = series.dtype();

    if dtype.is_float() {
        let floats = series.cast(&DataType::Float64)?;
        let ca = floats.f64()?;
        let Some(m) = ca.median() else {
            return Ok(sentinel_series(name, series.len()));
        };
        // `+ 0.0` folds -0.0 into 0.0 so the two dedupe as equal
        let filled: Float64Chunked = ca.into_iter().map(|v| Some(v.unwrap_or(m) + 0.0)).collect();
        return Ok(filled.with_name(name).into_series());
    }

    if series.null_count() == 0 {
        return Ok(series.clone());
    }

    if dtype.is_integer() {
        let ints = series.cast(&DataType::Int64)?;
        let ca = ints.i64()?;
        return Ok(match ca.median() {
            Some(m) if m.fract() == 0.0 => {
                let m = m as i64;
                let filled: Int64Chunked = ca.into_iter().map(|v| Some(v.unwrap_or(m))).collect();
                filled.with_name(name).into_series()
            }
            Some(m) => {
                let filled: Float64Chunked =
                    ca.into_iter().map(|v| Some(v.map_or(m, |x| x as f64))).collect();
                filled.with_name(name).into_series()
            }
            None => sentinel_series(name, series.len()),
        });
    }

    let text = series.cast(&DataType::String)?;
    let filled: StringChunked = text
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(MISSING_SENTINEL)))
        .collect();
    Ok(filled.with_name(name).into_series())
}

fn fill_missing(frame: &DataFrame) -> Result<DataFrame> {
    let columns = frame
        .get_columns()
        .iter()
        .map(|c| fill_series(c.as_materialized_series()).map(Column::from))
        .collect::<PolarsResult<Vec<Column>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Replace `column` with parsed timestamps, returning how many cells failed to parse.
fn parse_dates(frame: &mut DataFrame, column: &str) -> Result<usize> {
    let texts = frame
        .column(column)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let parsed: Vec<Option<NaiveDateTime>> = texts
        .str()?
        .into_iter()
        .map(|text| text.and_then(parse_timestamp))
        .collect();

    let failed = parsed.iter().filter(|ts| ts.is_none()).count();
    if failed > 0 {
        debug!("{} values in '{}' did not parse as dates", failed, column);
    }

    frame.with_column(timestamp_series(column, parsed))?;
    Ok(failed)
}

fn derive_time_features(frame: &mut DataFrame, column: &str) -> Result<()> {
    let series = frame.column(column)?.as_materialized_series();
    if !matches!(series.dtype(), DataType::Datetime(_, _)) {
        return Ok(());
    }
    let dates: Vec<Option<NaiveDateTime>> = series.datetime()?.as_datetime_iter().collect();

    let feature = |f: fn(&NaiveDateTime) -> i64| -> Vec<Option<i64>> {
        dates.iter().map(|d| d.as_ref().map(f)).collect()
    };
    let day_names: Vec<Option<&str>> = dates
        .iter()
        .map(|d| d.map(|d| day_name(d.weekday())))
        .collect();

    frame.with_column(Series::new(ORDER_YEAR.into(), feature(|d| i64::from(d.year()))))?;
    frame.with_column(Series::new(ORDER_MONTH.into(), feature(|d| i64::from(d.month()))))?;
    frame.with_column(Series::new(
        ORDER_DAY_OF_WEEK.into(),
        feature(|d| i64::from(d.weekday().num_days_from_monday())),
    ))?;
    frame.with_column(Series::new(ORDER_DAY_NAME.into(), day_names))?;
    Ok(())
}

fn drop_duplicates(frame: DataFrame) -> Result<(DataFrame, usize)> {
    let before = frame.height();
    let unique = frame
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    let removed = before - unique.height();
    Ok((unique, removed))
}
