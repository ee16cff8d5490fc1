// src/external/pair_format.rs - Line format consumed by an out-of-process pair classifier
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::{CandidatePair, Field, GroundTruthEntry, Record, RecordTable};

const MISSING_VALUE: &str = "NaN";

/// Inference lines for blocked candidates use a short field list and plain
/// tags; labeled training splits carry every attribute with bracketed tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairFormat {
    Candidates,
    Training,
}

impl PairFormat {
    pub fn fields(&self) -> &'static [Field] {
        match self {
            PairFormat::Candidates => &[
                Field::Make,
                Field::Model,
                Field::Year,
                Field::Transmission,
                Field::FuelType,
            ],
            PairFormat::Training => &[
                Field::Make,
                Field::Model,
                Field::Year,
                Field::Mileage,
                Field::Price,
                Field::Transmission,
                Field::BodyType,
                Field::FuelType,
            ],
        }
    }

    fn tags(&self) -> (&'static str, &'static str) {
        match self {
            PairFormat::Candidates => ("COL", "VAL"),
            PairFormat::Training => ("[COL]", "[VAL]"),
        }
    }
}

pub fn serialize_record(record: &Record, format: PairFormat) -> String {
    let (col, val) = format.tags();
    format
        .fields()
        .iter()
        .map(|field| {
            let value = record
                .get(*field)
                .map(|v| sanitize(&v))
                .unwrap_or_else(|| MISSING_VALUE.to_string());
            format!("{} {} {} {}", col, field.as_str(), val, value)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `left \t right \t label`
pub fn serialize_pair(left: &Record, right: &Record, label: u8, format: PairFormat) -> String {
    format!(
        "{}\t{}\t{}",
        serialize_record(left, format),
        serialize_record(right, format),
        label
    )
}

// tabs and newlines would break the line structure
fn sanitize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub written: usize,
    pub skipped: usize,
}

/// Writes one inference line per candidate (label placeholder `0`). Returns
/// the pairs actually written, in line order, for re-attaching predictions.
pub fn export_candidates(
    path: &Path,
    pairs: &[CandidatePair],
    left: &RecordTable,
    right: &RecordTable,
) -> Result<(Vec<CandidatePair>, ExportStats)> {
    let mut lines = Vec::with_capacity(pairs.len());
    let mut written_pairs = Vec::with_capacity(pairs.len());
    let mut stats = ExportStats::default();
    for pair in pairs {
        match (left.get(&pair.left_id), right.get(&pair.right_id)) {
            (Some(l), Some(r)) => {
                lines.push(serialize_pair(l, r, 0, PairFormat::Candidates));
                written_pairs.push(pair.clone());
            }
            _ => stats.skipped += 1,
        }
    }
    stats.written = lines.len();
    write_lines(path, &lines)?;
    log_export(path, &stats);
    Ok((written_pairs, stats))
}

/// Writes one labeled line per ground-truth entry whose records are loaded.
pub fn export_labeled(
    path: &Path,
    ground_truth: &[GroundTruthEntry],
    left: &RecordTable,
    right: &RecordTable,
) -> Result<ExportStats> {
    let mut lines = Vec::with_capacity(ground_truth.len());
    let mut stats = ExportStats::default();
    for entry in ground_truth {
        match (left.get(&entry.left_id), right.get(&entry.right_id)) {
            (Some(l), Some(r)) => lines.push(serialize_pair(l, r, entry.label, PairFormat::Training)),
            _ => stats.skipped += 1,
        }
    }
    stats.written = lines.len();
    write_lines(path, &lines)?;
    log_export(path, &stats);
    Ok(stats)
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{}", line).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

fn log_export(path: &Path, stats: &ExportStats) {
    info!("Exported {} pair lines to {}", stats.written, path.display());
    if stats.skipped > 0 {
        warn!("Skipped {} pairs whose records are not loaded", stats.skipped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use tempfile::tempdir;

    fn civic(id: &str, source: Source) -> Record {
        Record::new(id, source)
            .with(Field::Make, "honda")
            .with(Field::Model, "civic\tsi")
            .with(Field::Year, "2016")
    }

    #[test]
    fn candidate_lines_use_plain_tags_and_nan() {
        let line = serialize_pair(&civic("1", Source::Left), &civic("10", Source::Right), 0, PairFormat::Candidates);
        let parts: Vec<&str> = line.split('\t').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            "COL make VAL honda COL model VAL civic si COL year VAL 2016 COL transmission VAL NaN COL fuel_type VAL NaN"
        );
        assert_eq!(parts[2], "0");
    }

    #[test]
    fn training_lines_carry_every_attribute() {
        let record = serialize_record(&civic("1", Source::Left), PairFormat::Training);
        assert!(record.starts_with("[COL] make [VAL] honda"));
        assert_eq!(record.matches("[COL]").count(), 8);
    }

    #[test]
    fn export_skips_unknown_pairs_and_keeps_order() {
        let dir = tempdir().unwrap();
        let left = RecordTable::new(Source::Left, vec![civic("1", Source::Left), civic("2", Source::Left)]);
        let right = RecordTable::new(Source::Right, vec![civic("10", Source::Right)]);
        let pairs = vec![
            CandidatePair::new("2", "10"),
            CandidatePair::new("3", "10"),
            CandidatePair::new("1", "10"),
        ];
        let path = dir.path().join("candidates.txt");
        let (written, stats) = export_candidates(&path, &pairs, &left, &right).unwrap();
        assert_eq!(stats, ExportStats { written: 2, skipped: 1 });
        assert_eq!(written, vec![CandidatePair::new("2", "10"), CandidatePair::new("1", "10")]);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
