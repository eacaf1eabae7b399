use crate::error::{EtlError, Result};
use crate::frame::render_column;
use crate::metrics::{time_stage, EtlMetrics};
use polars::prelude::*;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct FileSinkSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

impl FileSinkSummary {
    pub fn size_kb(&self) -> f64 {
        (self.bytes as f64 / 1024.0 * 10.0).round() / 10.0
    }
}

/// Sibling path the table is written to before being renamed over `path`
fn staging_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!(".{name}.tmp")))
}

/// Timestamp columns swapped for their text rendering
fn with_rendered_timestamps(frame: &DataFrame) -> PolarsResult<DataFrame> {
    let mut out = frame.clone();
    for column in frame.get_columns() {
        if let DataType::Datetime(_, _) = column.dtype() {
            let text = Series::new(column.name().clone(), render_column(column)?);
            out.with_column(text)?;
        }
    }
    Ok(out)
}

fn write_records(frame: &DataFrame, path: &Path) -> io::Result<()> {
    let mut output = with_rendered_timestamps(frame).map_err(io::Error::other)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut output)
        .map_err(io::Error::other)?;
    file.sync_all()
}

/// Write `frame` as CSV with a header row and no index column.
///
/// The destination directory is created if needed. The file is replaced in one rename, so readers never see
/// a half-written file.
#[instrument(skip(frame), fields(path = %path.display(), rows = frame.height()))]
pub fn write_csv(frame: &DataFrame, path: &Path) -> Result<FileSinkSummary> {
    let _timing = time_stage("save_file");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EtlError::write_failure(path, e))?;
    }

    let staging = staging_path(path).ok_or_else(|| {
        EtlError::write_failure(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
        )
    })?;

    if let Err(e) = write_records(frame, &staging) {
        let _ = fs::remove_file(&staging);
        return Err(EtlError::write_failure(path, e));
    }
    debug!("Wrote staging file {}", staging.display());

    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        EtlError::write_failure(path, e)
    })?;

    let bytes = fs::metadata(path)
        .map_err(|e| EtlError::write_failure(path, e))?
        .len();

    EtlMetrics::record_rows_written(frame.height());
    info!(bytes, "Saved cleaned dataset");

    Ok(FileSinkSummary {
        path: path.to_path_buf(),
        rows: frame.height(),
        bytes,
    })
}
