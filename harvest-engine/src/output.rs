//! Persisting an [`ExtractionTable`] as csv, json, xlsx or pickle.
//!
//! The file lands at `{path}.{extension}`. Bytes are encoded in memory first
//! and written through a temporary file in the target directory that is then
//! renamed into place, so a failed save never leaves a partial file behind.
use crate::table::ExtractionTable;
use harvest_common::{HarvestError, OutputFormat, Result};
use rust_xlsxwriter::Workbook;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `{path}.{extension}`; any extension already on `path` is kept.
pub fn target_path(path: &Path, format: OutputFormat) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".");
    raw.push(format.extension());
    PathBuf::from(raw)
}

/// Write `table` next to `path`. An empty table is skipped and yields `None`.
pub fn save(table: &ExtractionTable, path: &Path, format: OutputFormat) -> Result<Option<PathBuf>> {
    if table.is_empty() {
        warn!(target: "engine.output", path = %path.display(), %format, "table is empty; nothing saved");
        return Ok(None);
    }
    let target = target_path(path, format);
    let bytes = encode(table, format)?;
    write_atomically(&target, &bytes)?;
    info!(
        target: "engine.output",
        path = %target.display(),
        %format,
        rows = table.row_count(),
        columns = table.column_count(),
        bytes = bytes.len(),
        "table saved"
    );
    Ok(Some(target))
}

/// Encode `table` in `format` without touching the filesystem.
pub fn encode(table: &ExtractionTable, format: OutputFormat) -> Result<Vec<u8>> {
    let mut aligned = table.clone();
    aligned.level();
    match format {
        OutputFormat::Csv => encode_csv(&aligned),
        OutputFormat::Json => encode_json(&aligned),
        OutputFormat::Xlsx => encode_xlsx(&aligned),
        OutputFormat::Pickle => serde_pickle::to_vec(&aligned, serde_pickle::SerOptions::new())
            .map_err(|e| encoding_error("pickle", e)),
    }
}

fn encode_csv(table: &ExtractionTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .map_err(|e| encoding_error("csv", e))?;
    for index in 0..table.row_count() {
        writer
            .write_record(table.row(index))
            .map_err(|e| encoding_error("csv", e))?;
    }
    writer.into_inner().map_err(|e| encoding_error("csv", e))
}

fn encode_json(table: &ExtractionTable) -> Result<Vec<u8>> {
    let records: Vec<Value> = (0..table.row_count())
        .map(|index| {
            let record: Map<String, Value> = table
                .column_names()
                .zip(table.row(index))
                .map(|(name, cell)| (name.to_string(), Value::String(cell.to_string())))
                .collect();
            Value::Object(record)
        })
        .collect();
    serde_json::to_vec_pretty(&records).map_err(|e| encoding_error("json", e))
}

fn encode_xlsx(table: &ExtractionTable) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, (name, values)) in table.columns().enumerate() {
        let col = u16::try_from(col).map_err(|e| encoding_error("xlsx", e))?;
        sheet
            .write_string(0, col, name)
            .map_err(|e| encoding_error("xlsx", e))?;
        for (row, value) in values.iter().enumerate() {
            let row = u32::try_from(row + 1).map_err(|e| encoding_error("xlsx", e))?;
            sheet
                .write_string(row, col, value)
                .map_err(|e| encoding_error("xlsx", e))?;
        }
    }
    workbook.save_to_buffer().map_err(|e| encoding_error("xlsx", e))
}

fn encoding_error(format: &str, err: impl std::fmt::Display) -> HarvestError {
    HarvestError::Io(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("{format} encoding failed: {err}"),
    ))
}

fn write_atomically(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
