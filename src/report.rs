//! Read-only diagnostic report over the processed dataset.

use crate::constants::REPORT_SAMPLE_ROWS;
use crate::error::Result;
use crate::frame::{column_names, is_numeric, render_column};
use crate::pipeline::extract::load_csv;
use polars::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

const RULE: &str = "============================================================";

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    fn from_series(series: &Series) -> PolarsResult<Self> {
        let floats = series.cast(&DataType::Float64)?;
        let ca = floats.f64()?;
        let quantile = |q: f64| -> PolarsResult<Option<f64>> { ca.quantile(q, QuantileMethod::Linear) };
        Ok(Self {
            column: series.name().to_string(),
            count: ca.len() - ca.null_count(),
            mean: ca.mean(),
            std: ca.std(1),
            min: ca.min(),
            p25: quantile(0.25)?,
            p50: quantile(0.5)?,
            p75: quantile(0.75)?,
            max: ca.max(),
        })
    }

    fn cells(&self) -> [Option<f64>; 8] {
        [
            Some(self.count as f64),
            self.mean,
            self.std,
            self.min,
            self.p25,
            self.p50,
            self.p75,
            self.max,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
    pub missing: Vec<(String, usize)>,
    pub numeric: Vec<NumericSummary>,
    /// First rows, rendered as text; missing cells read `NaN`
    pub sample: Vec<Vec<String>>,
}

impl DatasetReport {
    pub fn from_frame(path: &Path, frame: &DataFrame) -> Result<Self> {
        let rendered = frame
            .get_columns()
            .iter()
            .map(render_column)
            .collect::<PolarsResult<Vec<_>>>()?;
        let sample = (0..frame.height().min(REPORT_SAMPLE_ROWS))
            .map(|row| {
                rendered
                    .iter()
                    .map(|cells| cells[row].clone().unwrap_or_else(|| "NaN".to_string()))
                    .collect()
            })
            .collect();

        let numeric = frame
            .get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| NumericSummary::from_series(c.as_materialized_series()))
            .collect::<PolarsResult<Vec<_>>>()?;

        Ok(Self {
            path: path.to_path_buf(),
            rows: frame.height(),
            columns: column_names(frame).into_iter().map(str::to_string).collect(),
            missing: frame
                .get_columns()
                .iter()
                .map(|c| (c.name().to_string(), c.null_count()))
                .collect(),
            numeric,
            sample,
        })
    }

    /// Load the processed dataset and summarise it; `None` when the file does not exist yet.
    pub fn from_path(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let frame = load_csv(path)?;
        Self::from_frame(path, &frame).map(Some)
    }

    fn fmt_numeric(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const HEADERS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];
        let name_width = self.numeric.iter().map(|s| s.column.len()).max().unwrap_or(0);
        let cells: Vec<Vec<String>> = self
            .numeric
            .iter()
            .map(|s| {
                s.cells()
                    .iter()
                    .map(|v| v.map_or_else(|| "NaN".to_string(), |v| format!("{v:.2}")))
                    .collect()
            })
            .collect();
        let widths: Vec<usize> = (0..HEADERS.len())
            .map(|i| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .chain([HEADERS[i].len()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:name_width$}", "")?;
        for (header, width) in HEADERS.iter().zip(&widths) {
            write!(f, "  {header:>width$}")?;
        }
        writeln!(f)?;
        for (summary, row) in self.numeric.iter().zip(&cells) {
            write!(f, "{:<name_width$}", summary.column)?;
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "  {cell:>width$}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }

    fn fmt_sample(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                self.sample
                    .iter()
                    .map(|row| row[i].len())
                    .chain([name.len()])
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |f: &mut fmt::Formatter<'_>, cells: &mut dyn Iterator<Item = &String>| {
            let parts: Vec<String> = cells
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:>width$}"))
                .collect();
            writeln!(f, "{}", parts.join(" "))
        };

        line(f, &mut self.columns.iter())?;
        for row in &self.sample {
            line(f, &mut row.iter())?;
        }
        Ok(())
    }
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "DELIVERIES DATA - VALIDATION REPORT")?;
        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            "Rows: {}, Columns: {}",
            group_thousands(self.rows),
            self.columns.len()
        )?;

        writeln!(f, "\nColumns:")?;
        for column in &self.columns {
            writeln!(f, "  - {column}")?;
        }

        writeln!(f, "\nMissing values per column:")?;
        for (column, count) in &self.missing {
            writeln!(f, "  {column}: {count}")?;
        }

        if !self.numeric.is_empty() {
            writeln!(f, "\nNumeric summary:")?;
            self.fmt_numeric(f)?;
        }

        writeln!(f, "\nSample rows:")?;
        self.fmt_sample(f)?;

        write!(f, "\nValidation done.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_frame() -> DataFrame {
        let ids: Vec<String> = (1..=7).map(|i| format!("O{i}")).collect();
        df!(
            "Order_ID" => ids,
            "Agent_Age" => [Some(20i64), Some(22), Some(24), Some(26), Some(28), Some(30), None]
        )
        .unwrap()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(43739), "43,739");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_report_from_frame() {
        let report = DatasetReport::from_frame(Path::new("out.csv"), &sample_frame()).unwrap();

        assert_eq!(report.rows, 7);
        assert_eq!(report.columns, vec!["Order_ID", "Agent_Age"]);
        assert_eq!(
            report.missing,
            vec![("Order_ID".to_string(), 0), ("Agent_Age".to_string(), 1)]
        );
        assert_eq!(report.sample.len(), REPORT_SAMPLE_ROWS);
        assert_eq!(report.sample[0], vec!["O1", "20"]);

        assert_eq!(report.numeric.len(), 1);
        let age = &report.numeric[0];
        assert_eq!(age.count, 6);
        assert_eq!(age.mean, Some(25.0));
        assert_eq!(age.min, Some(20.0));
        assert_eq!(age.p25, Some(22.5));
        assert_eq!(age.p50, Some(25.0));
        assert_eq!(age.max, Some(30.0));
    }

    #[test]
    fn test_report_renders_sections() {
        let text = DatasetReport::from_frame(Path::new("out.csv"), &sample_frame()).unwrap().to_string();

        assert!(text.contains("Rows: 7, Columns: 2"));
        assert!(text.contains("  - Agent_Age"));
        assert!(text.contains("  Agent_Age: 1"));
        assert!(text.contains("Numeric summary:"));
        assert!(text.contains("25.00"));
        assert!(text.ends_with("Validation done."));
    }

    #[test]
    fn test_missing_file_yields_none() {
        let dir = tempdir().unwrap();
        assert!(DatasetReport::from_path(&dir.path().join("absent.csv")).unwrap().is_none());

        let path = dir.path().join("present.csv");
        fs::write(&path, "a,b\n1,x\n").unwrap();
        let report = DatasetReport::from_path(&path).unwrap().unwrap();
        assert_eq!(report.rows, 1);
    }
}
