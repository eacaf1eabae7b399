//! Helpers over the polars `DataFrame` that carries the working table between stages.

use chrono::{NaiveDateTime, Timelike};
use polars::prelude::*;

const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%d";
const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn column_names(frame: &DataFrame) -> Vec<&str> {
    frame.get_column_names().into_iter().map(|name| name.as_str()).collect()
}

/// Null cells across every column
pub fn missing_cells(frame: &DataFrame) -> usize {
    frame.get_columns().iter().map(|c| c.null_count()).sum()
}

pub fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_integer() || dtype.is_float()
}

fn is_midnight(ts: &NaiveDateTime) -> bool {
    ts.time().num_seconds_from_midnight() == 0 && ts.nanosecond() == 0
}

/// Cell values as text, `None` for nulls.
///
/// Timestamps are written as plain dates when every value in the column falls on midnight.
pub fn render_column(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let series = column.as_materialized_series();
    if let DataType::Datetime(_, _) = series.dtype() {
        let values: Vec<Option<NaiveDateTime>> = series.datetime()?.as_datetime_iter().collect();
        let format = if values.iter().flatten().all(is_midnight) {
            DATE_OUTPUT_FORMAT
        } else {
            DATETIME_OUTPUT_FORMAT
        };
        return Ok(values
            .iter()
            .map(|ts| ts.map(|ts| ts.format(format).to_string()))
            .collect());
    }

    let text = series.cast(&DataType::String)?;
    Ok(text.str()?.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Build a millisecond timestamp series.
pub fn timestamp_series(name: &str, values: Vec<Option<NaiveDateTime>>) -> Series {
    DatetimeChunked::from_naive_datetime_options(name.into(), values, TimeUnit::Milliseconds)
        .into_series()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 19).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_render_timestamps_as_dates_when_all_midnight() {
        let dates = Column::from(timestamp_series("d", vec![Some(ts(0, 0)), None]));
        assert_eq!(
            render_column(&dates).unwrap(),
            vec![Some("2022-03-19".to_string()), None]
        );

        let times = Column::from(timestamp_series("d", vec![Some(ts(0, 0)), Some(ts(11, 30))]));
        assert_eq!(
            render_column(&times).unwrap(),
            vec![
                Some("2022-03-19 00:00:00".to_string()),
                Some("2022-03-19 11:30:00".to_string())
            ]
        );
    }

    #[test]
    fn test_render_numbers_and_missing_cells() {
        let frame = df!(
            "rating" => [Some(4.0), Some(4.25), None],
            "age" => [Some(30i64), None, Some(25)]
        )
        .unwrap();

        assert_eq!(
            render_column(frame.column("rating").unwrap()).unwrap(),
            vec![Some("4.0".to_string()), Some("4.25".to_string()), None]
        );
        assert_eq!(missing_cells(&frame), 2);
        assert_eq!(column_names(&frame), vec!["rating", "age"]);
        assert!(is_numeric(frame.column("age").unwrap().dtype()));
    }
}
