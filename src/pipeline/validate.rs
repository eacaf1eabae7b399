use crate::config::KpiThresholds;
use crate::constants::IS_ON_TIME;
use crate::metrics::{time_stage, EtlMetrics};
use crate::frame::{column_names, missing_cells};
use crate::pipeline::classify::{ColumnClassifier, ColumnRole};
use polars::prelude::*;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Advisory diagnostics for a cleaned table. Nothing in here stops a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub rows: usize,
    pub columns: usize,
    pub identifier_column: Option<String>,
    /// Distinct identifiers / rows; `None` without an identifier column or rows
    pub identifier_unique_ratio: Option<f64>,
    pub missing_cells: usize,
    pub missing_percent: f64,
    /// Share of rows flagged on time, when delivery flags were derived
    pub on_time_rate: Option<f64>,
    pub on_time_target: f64,
}

impl ValidationReport {
    pub fn below_on_time_target(&self) -> bool {
        self.on_time_rate
            .is_some_and(|rate| rate < self.on_time_target)
    }
}

pub struct Validator {
    classifier: Arc<dyn ColumnClassifier>,
    kpi: KpiThresholds,
}

impl Validator {
    pub fn new(classifier: Arc<dyn ColumnClassifier>, kpi: KpiThresholds) -> Self {
        Self { classifier, kpi }
    }

    #[instrument(skip_all, fields(rows = frame.height()))]
    pub fn validate(&self, frame: &DataFrame) -> ValidationReport {
        let _timing = time_stage("validate");
        let rows = frame.height();
        let columns = frame.width();

        let identifier_column = self
            .classifier
            .first_with_role(&column_names(frame), ColumnRole::Identifier)
            .map(str::to_string);
        let identifier_unique_ratio = identifier_column
            .as_deref()
            .and_then(|name| frame.column(name).ok())
            .filter(|_| rows > 0)
            .and_then(|column| column.as_materialized_series().drop_nulls().n_unique().ok())
            .map(|distinct| distinct as f64 / rows as f64);

        let missing_cells = missing_cells(frame);
        let total_cells = rows * columns;
        let missing_percent = if total_cells == 0 {
            0.0
        } else {
            missing_cells as f64 / total_cells as f64 * 100.0
        };

        let on_time_rate = frame
            .column(IS_ON_TIME)
            .ok()
            .filter(|_| rows > 0)
            .and_then(|column| column.as_materialized_series().cast(&DataType::Float64).ok())
            .and_then(|flags| flags.f64().ok().and_then(|ca| ca.sum()))
            .map(|on_time| on_time / rows as f64);

        let report = ValidationReport {
            rows,
            columns,
            identifier_column,
            identifier_unique_ratio,
            missing_cells,
            missing_percent,
            on_time_rate,
            on_time_target: self.kpi.on_time_delivery_target,
        };

        EtlMetrics::record_missing_percent(missing_percent);
        info!(
            missing_percent = report.missing_percent,
            unique_ratio = ?report.identifier_unique_ratio,
            "Validation complete"
        );
        if report.below_on_time_target() {
            warn!(
                on_time_rate = ?report.on_time_rate,
                target = report.on_time_target,
                "On-time rate below target (advisory)"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::NameSubstringClassifier;

    fn validator() -> Validator {
        Validator::new(Arc::new(NameSubstringClassifier::new()), KpiThresholds::default())
    }

    #[test]
    fn test_unique_ratio_and_missing_percent() {
        let frame = df!(
            "Order_ID" => ["a", "a", "b", "c"],
            "Agent_Age" => [Some(1i64), None, Some(3), Some(4)]
        )
        .unwrap();

        let report = validator().validate(&frame);

        assert_eq!(report.rows, 4);
        assert_eq!(report.columns, 2);
        assert_eq!(report.identifier_column.as_deref(), Some("Order_ID"));
        assert_eq!(report.identifier_unique_ratio, Some(0.75));
        assert_eq!(report.missing_cells, 1);
        assert_eq!(report.missing_percent, 12.5);
        assert_eq!(report.on_time_rate, None);
        assert!(!report.below_on_time_target());
    }

    #[test]
    fn test_empty_table_reports_zeroes() {
        let frame = df!("order_id" => Vec::<&str>::new()).unwrap();

        let report = validator().validate(&frame);

        assert_eq!(report.rows, 0);
        assert_eq!(report.identifier_unique_ratio, None);
        assert_eq!(report.missing_percent, 0.0);
    }

    #[test]
    fn test_on_time_rate_is_advisory() {
        let frame = df!(IS_ON_TIME => [1i64, 0, 1, 1]).unwrap();

        let report = validator().validate(&frame);

        assert_eq!(report.on_time_rate, Some(0.75));
        assert!(report.below_on_time_target());
        assert_eq!(report.identifier_column, None);
    }
}
