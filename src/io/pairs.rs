// src/io/pairs.rs - Pair-shaped CSV files (match sets, candidate lists)
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

use crate::error::LinkageError;
use crate::io::records::{is_null, normalize_id};
use crate::models::{CandidatePair, MatchSet, ScoredPair};

/// Accepted (left, right) header spellings, compared case-insensitively.
pub const PAIR_COLUMN_ALIASES: [(&str, &str); 3] = [("left_id", "right_id"), ("id_cl", "id_us"), ("cl_id", "us_id")];

const SCORE_COLUMNS: [&str; 4] = ["score", "confidence", "match_confidence", "total_score"];

/// Column positions of the id pair (and score, if present) in a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairColumns {
    pub left: usize,
    pub right: usize,
    pub score: Option<usize>,
}

pub fn locate_pair_columns(headers: &[String], origin: &str) -> Result<PairColumns, LinkageError> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
    let position = |name: &str| normalized.iter().position(|h| h == name);
    for (left, right) in PAIR_COLUMN_ALIASES {
        if let (Some(l), Some(r)) = (position(left), position(right)) {
            let score = SCORE_COLUMNS.iter().find_map(|s| position(s));
            return Ok(PairColumns { left: l, right: r, score });
        }
    }
    Err(LinkageError::MalformedInput {
        origin: origin.to_string(),
        row: 1,
        reason: format!("no id pair columns (expected one of {:?})", PAIR_COLUMN_ALIASES),
    })
}

/// Reads id pairs with an optional score. An absent score column or an empty
/// score cell reads as 1.0; any other value must be a finite number.
pub fn read_scored_pairs<R: Read>(reader: R, origin: &str) -> Result<Vec<ScoredPair>> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", origin))?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = locate_pair_columns(&headers, origin)?;

    let mut pairs = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse {} at row {}", origin, row + 2))?;
        let left = record.get(columns.left).unwrap_or_default();
        let right = record.get(columns.right).unwrap_or_default();
        if is_null(left) || is_null(right) {
            return Err(LinkageError::MalformedInput {
                origin: origin.to_string(),
                row: row + 2,
                reason: "empty id".to_string(),
            }
            .into());
        }
        let raw_score = columns.score.and_then(|i| record.get(i)).map(str::trim).unwrap_or_default();
        let score = if raw_score.is_empty() {
            1.0
        } else {
            match raw_score.parse::<f64>() {
                Ok(score) if score.is_finite() => score,
                _ => {
                    return Err(LinkageError::MalformedInput {
                        origin: origin.to_string(),
                        row: row + 2,
                        reason: format!("score '{}' is not a finite number", raw_score),
                    }
                    .into())
                }
            }
        };
        pairs.push(ScoredPair::new(
            CandidatePair::new(normalize_id(left).as_str(), normalize_id(right).as_str()),
            score,
        ));
    }
    Ok(pairs)
}

pub fn load_scored_pairs(path: &Path) -> Result<Vec<ScoredPair>> {
    if !path.exists() {
        return Err(LinkageError::MissingInput {
            resource: "pair file".to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = std::fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_scored_pairs(file, &path.display().to_string())
}

pub fn load_pairs(path: &Path) -> Result<Vec<CandidatePair>> {
    Ok(load_scored_pairs(path)?.into_iter().map(|p| p.pair).collect())
}

#[derive(Serialize)]
struct PairRow<'a> {
    left_id: &'a str,
    right_id: &'a str,
    score: f64,
}

pub fn write_scored_pairs(path: &Path, pairs: &[ScoredPair]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    // header written by hand so an empty match set still yields a readable file
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(["left_id", "right_id", "score"])
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for pair in pairs {
        writer
            .serialize(PairRow {
                left_id: pair.pair.left_id.as_str(),
                right_id: pair.pair.right_id.as_str(),
                score: pair.score,
            })
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

pub fn write_match_set(path: &Path, matches: &MatchSet) -> Result<()> {
    write_scored_pairs(path, matches.pairs())?;
    info!("Wrote {} matches to {}", matches.len(), path.display());
    Ok(())
}

/// Candidate list without scores, e.g. the id sidecar of an export.
pub fn write_pairs(path: &Path, pairs: &[CandidatePair]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    writer
        .write_record(["left_id", "right_id"])
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for pair in pairs {
        writer
            .write_record([pair.left_id.as_str(), pair.right_id.as_str()])
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::resolve;
    use tempfile::tempdir;

    #[test]
    fn header_variants_resolve_to_same_pairs() {
        let a = read_scored_pairs("CL_ID,US_ID\n1,10\n".as_bytes(), "a.csv").unwrap();
        let b = read_scored_pairs("id_cl,id_us,score\n1.0,10,0.7\n".as_bytes(), "b.csv").unwrap();
        assert_eq!(a[0].pair, b[0].pair);
        assert_eq!(a[0].score, 1.0);
        assert_eq!(b[0].score, 0.7);
    }

    #[test]
    fn empty_score_reads_as_certain_but_garbage_is_rejected() {
        let pairs = read_scored_pairs("left_id,right_id,score\n1,10,\n2,11,0.4\n".as_bytes(), "ok.csv").unwrap();
        assert_eq!(pairs[0].score, 1.0);
        assert_eq!(pairs[1].score, 0.4);

        let err = read_scored_pairs("left_id,right_id,score\n1,10,0.9\n2,11,high\n".as_bytes(), "scores.csv")
            .unwrap_err();
        match err.downcast_ref::<LinkageError>() {
            Some(LinkageError::MalformedInput { origin, row, .. }) => {
                assert_eq!(origin, "scores.csv");
                assert_eq!(*row, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(read_scored_pairs("left_id,right_id,score\n1,10,NaN\n".as_bytes(), "nan.csv").is_err());
    }

    #[test]
    fn unknown_headers_are_rejected() {
        let err = read_scored_pairs("a,b\n1,2\n".as_bytes(), "bad.csv").unwrap_err();
        assert!(err.downcast_ref::<LinkageError>().is_some());
    }

    #[test]
    fn match_set_round_trips_through_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches_rule_make_year.csv");
        let set = resolve(vec![ScoredPair::new(CandidatePair::new("1", "10"), 0.875)]);
        write_match_set(&path, &set).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("left_id,right_id,score\n1,10,0.875"));
        assert_eq!(load_scored_pairs(&path).unwrap(), set.into_pairs());
    }

    #[test]
    fn empty_match_set_still_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches_rule_year_body.csv");
        write_match_set(&path, &resolve(Vec::new())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "left_id,right_id,score\n");
        assert!(load_pairs(&path).unwrap().is_empty());
    }
}
