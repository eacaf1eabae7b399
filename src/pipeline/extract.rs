use crate::constants::NA_TOKENS;
use crate::error::{EtlError, Result};
use crate::metrics::{time_stage, EtlMetrics};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, instrument};

fn read_options() -> CsvReadOptions {
    let null_values = NullValues::AllColumns(NA_TOKENS.iter().map(|t| (*t).into()).collect());
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(CsvParseOptions::default().with_null_values(Some(null_values)))
}

/// Read a CSV file with a header row into a `DataFrame`, inferring each column's type from every row.
///
/// Any cell matching one of the NA tokens is loaded as null.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let _timing = time_stage("extract");
    if !path.exists() {
        return Err(EtlError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path)?;
    let frame = read_options().into_reader_with_file_handle(file).finish()?;

    for column in frame.get_columns() {
        debug!(column = %column.name(), dtype = %column.dtype(), "Inferred column type");
    }
    EtlMetrics::record_rows_loaded(frame.height());
    info!(
        rows = frame.height(),
        columns = frame.width(),
        "Loaded raw dataset"
    );
    Ok(frame)
}
