// src/io/ground_truth.rs
use anyhow::{Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::blocking::derive_seed;
use crate::error::LinkageError;
use crate::io::pairs::locate_pair_columns;
use crate::io::records::{is_null, normalize_id};
use crate::models::GroundTruthEntry;

const LABEL_COLUMNS: [&str; 3] = ["label", "is_match", "match"];

pub const TRAIN_FILE: &str = "gt_train.csv";
pub const VAL_FILE: &str = "gt_val.csv";
pub const TEST_FILE: &str = "gt_test.csv";

fn parse_label(raw: &str) -> Option<u8> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Some(1),
        "0" | "0.0" | "false" => Some(0),
        _ => None,
    }
}

/// Rows are `{left_id, right_id, label}` under any accepted pair header.
/// A file without a label column is positive-only truth.
pub fn read_ground_truth<R: Read>(reader: R, origin: &str) -> Result<Vec<GroundTruthEntry>> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", origin))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = locate_pair_columns(&headers, origin)?;
    let label_index = headers
        .iter()
        .position(|h| LABEL_COLUMNS.contains(&h.trim().to_ascii_lowercase().as_str()));
    if label_index.is_none() {
        warn!("{}: no label column, treating every row as a positive", origin);
    }

    let mut entries = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse {} at row {}", origin, row + 2))?;
        let left = record.get(columns.left).unwrap_or_default();
        let right = record.get(columns.right).unwrap_or_default();
        let malformed = |reason: &str| LinkageError::MalformedInput {
            origin: origin.to_string(),
            row: row + 2,
            reason: reason.to_string(),
        };
        if is_null(left) || is_null(right) {
            return Err(malformed("empty id").into());
        }
        let label = match label_index {
            Some(i) => {
                let raw = record.get(i).unwrap_or_default();
                parse_label(raw).ok_or_else(|| malformed(&format!("label '{}' is not 0 or 1", raw)))?
            }
            None => 1,
        };
        entries.push(GroundTruthEntry::new(
            normalize_id(left).as_str(),
            normalize_id(right).as_str(),
            label,
        ));
    }
    Ok(entries)
}

pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthEntry>> {
    if !path.exists() {
        return Err(LinkageError::MissingInput {
            resource: "ground truth".to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let entries = read_ground_truth(file, &path.display().to_string())?;
    let positives = entries.iter().filter(|e| e.is_positive()).count();
    info!(
        "Loaded {} ground-truth rows ({} positive) from {}",
        entries.len(),
        positives,
        path.display()
    );
    Ok(entries)
}

/// Like `load_ground_truth`, but an absent file is `None`.
pub fn load_optional_ground_truth(path: &Path) -> Result<Option<Vec<GroundTruthEntry>>> {
    if path.exists() {
        load_ground_truth(path).map(Some)
    } else {
        Ok(None)
    }
}

pub fn write_ground_truth(path: &Path, entries: &[GroundTruthEntry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(["left_id", "right_id", "label"])
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for entry in entries {
        let label = entry.label.to_string();
        writer
            .write_record([entry.left_id.as_str(), entry.right_id.as_str(), label.as_str()])
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruthSplit {
    pub train: Vec<GroundTruthEntry>,
    pub val: Vec<GroundTruthEntry>,
    pub test: Vec<GroundTruthEntry>,
}

/// Seeded shuffle, then 60% train, 20% val, 20% test.
pub fn split_ground_truth(entries: &[GroundTruthEntry], seed: u64) -> GroundTruthSplit {
    let shuffled = seeded_shuffle(entries, derive_seed(seed, &["ground_truth_split"]));
    let n = shuffled.len();
    let train_end = (n as f64 * 0.6).round() as usize;
    let val_end = train_end + ((n - train_end) as f64 / 2.0).floor() as usize;
    GroundTruthSplit {
        train: shuffled[..train_end].to_vec(),
        val: shuffled[train_end..val_end].to_vec(),
        test: shuffled[val_end..].to_vec(),
    }
}

fn seeded_shuffle(entries: &[GroundTruthEntry], seed: u64) -> Vec<GroundTruthEntry> {
    let mut shuffled = entries.to_vec();
    shuffled.shuffle(&mut StdRng::seed_from_u64(seed));
    shuffled
}

pub fn write_split(gt_dir: &Path, split: &GroundTruthSplit) -> Result<[PathBuf; 3]> {
    let paths = [gt_dir.join(TRAIN_FILE), gt_dir.join(VAL_FILE), gt_dir.join(TEST_FILE)];
    write_ground_truth(&paths[0], &split.train)?;
    write_ground_truth(&paths[1], &split.val)?;
    write_ground_truth(&paths[2], &split.test)?;
    info!(
        "Ground truth split: {} train / {} val / {} test written to {}",
        split.train.len(),
        split.val.len(),
        split.test.len(),
        gt_dir.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn entries(n: usize) -> Vec<GroundTruthEntry> {
        (0..n)
            .map(|i| GroundTruthEntry::new(format!("{}", i).as_str(), format!("u{}", i).as_str(), (i % 2) as u8))
            .collect()
    }

    #[test]
    fn reads_labels_and_positive_only_files() {
        let labeled = read_ground_truth("id_cl,id_us,label\n1,10,1\n2,11,0\n".as_bytes(), "gt.csv").unwrap();
        assert_eq!(labeled, vec![GroundTruthEntry::new("1", "10", 1), GroundTruthEntry::new("2", "11", 0)]);

        let vin_only = read_ground_truth("id_cl,id_us\n3.0,12\n".as_bytes(), "vin.csv").unwrap();
        assert_eq!(vin_only, vec![GroundTruthEntry::new("3", "12", 1)]);

        let err = read_ground_truth("left_id,right_id,label\n1,10,maybe\n".as_bytes(), "bad.csv").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinkageError>(),
            Some(LinkageError::MalformedInput { row: 2, .. })
        ));
    }

    #[test]
    fn split_is_a_seeded_partition() {
        let all = entries(100);
        let split = split_ground_truth(&all, 42);
        assert_eq!((split.train.len(), split.val.len(), split.test.len()), (60, 20, 20));

        let union: HashSet<_> = split.train.iter().chain(&split.val).chain(&split.test).cloned().collect();
        assert_eq!(union.len(), 100);
        assert_eq!(split, split_ground_truth(&all, 42));
        assert_ne!(split.train, split_ground_truth(&all, 43).train);
    }

    #[test]
    fn split_files_round_trip() {
        let dir = tempdir().unwrap();
        let split = split_ground_truth(&entries(10), 7);
        let paths = write_split(dir.path(), &split).unwrap();
        assert_eq!(load_ground_truth(&paths[0]).unwrap(), split.train);
        assert_eq!(load_optional_ground_truth(&dir.path().join("absent.csv")).unwrap(), None);
    }
}
