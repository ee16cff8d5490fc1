// src/io/records.rs - Loading cleaned listings from CSV
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::Read;
use std::path::Path;

use crate::error::LinkageError;
use crate::models::{Field, Record, RecordTable, Source};

pub const ID_COLUMNS: [&str; 3] = ["id", "id_cl", "id_us"];

/// Markers an upstream dataframe writer leaves for missing values.
const NULL_MARKERS: [&str; 4] = ["nan", "null", "none", "na"];

/// Integer-valued ids written as floats ("123.0") collapse to "123".
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('.') {
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() && value.fract() == 0.0 {
                return format!("{}", value as i64);
            }
        }
    }
    trimmed.to_string()
}

pub fn is_null(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || NULL_MARKERS.iter().any(|m| trimmed.eq_ignore_ascii_case(m))
}

pub fn read_records<R: Read>(reader: R, source: Source, origin: &str) -> Result<RecordTable> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", origin))?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let id_index = headers
        .iter()
        .position(|h| ID_COLUMNS.contains(&h.as_str()))
        .ok_or_else(|| LinkageError::MalformedInput {
            origin: origin.to_string(),
            row: 1,
            reason: format!("no id column (expected one of {:?})", ID_COLUMNS),
        })?;

    let mut columns: Vec<(usize, Field)> = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        if index == id_index {
            continue;
        }
        match header.parse::<Field>() {
            Ok(field) if !field.is_derived() => columns.push((index, field)),
            _ => debug!("{}: ignoring column '{}'", origin, header),
        }
    }

    let mut records = Vec::new();
    let mut missing_ids = 0usize;
    for (row, result) in csv_reader.records().enumerate() {
        let row_data = result.with_context(|| format!("Failed to parse {} at row {}", origin, row + 2))?;
        let id = row_data.get(id_index).map(normalize_id).unwrap_or_default();
        if is_null(&id) {
            missing_ids += 1;
            continue;
        }
        let mut record = Record::new(id.as_str(), source);
        for (index, field) in &columns {
            let value = row_data.get(*index).filter(|v| !is_null(v)).map(|v| v.to_string());
            record.set(*field, value);
        }
        records.push(record);
    }
    if missing_ids > 0 {
        warn!("{}: skipped {} rows without an id", origin, missing_ids);
    }
    Ok(RecordTable::new(source, records))
}

/// A missing file aborts the run with the resource named.
pub fn load_records(path: &Path, source: Source) -> Result<RecordTable> {
    if !path.exists() {
        return Err(LinkageError::MissingInput {
            resource: format!("{} records", source.as_str()),
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let table = read_records(file, source, &path.display().to_string())?;
    info!("Loaded {} {} records from {}", table.len(), source.as_str(), path.display());
    Ok(table)
}
