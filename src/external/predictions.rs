// src/external/predictions.rs - Re-attaching ids to external classifier output
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::LinkageError;
use crate::models::{CandidatePair, ScoredPair};

/// One JSON line of external output. `target` is accepted for `match`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    #[serde(rename = "match", alias = "target")]
    pub label: u8,
    #[serde(default)]
    pub match_confidence: Option<f64>,
}

impl Prediction {
    pub fn is_match(&self) -> bool {
        self.label == 1
    }

    /// Confidence of the reported label; absent means certain.
    pub fn confidence(&self) -> f64 {
        self.match_confidence.unwrap_or(1.0)
    }
}

pub fn parse_predictions<R: BufRead>(reader: R, origin: &str) -> Result<Vec<Prediction>> {
    let mut predictions = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", origin))?;
        if line.trim().is_empty() {
            continue;
        }
        let prediction: Prediction = serde_json::from_str(&line).map_err(|e| LinkageError::MalformedInput {
            origin: origin.to_string(),
            row: index + 1,
            reason: e.to_string(),
        })?;
        predictions.push(prediction);
    }
    Ok(predictions)
}

pub fn read_predictions(path: &Path) -> Result<Vec<Prediction>> {
    if !path.exists() {
        return Err(LinkageError::MissingInput {
            resource: "external predictions".to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let predictions = parse_predictions(BufReader::new(file), &path.display().to_string())?;
    info!("Read {} predictions from {}", predictions.len(), path.display());
    Ok(predictions)
}

/// Pairs predictions with ids by position. A length mismatch truncates both
/// sides to the shorter one.
pub fn align_predictions(
    mut pairs: Vec<CandidatePair>,
    mut predictions: Vec<Prediction>,
) -> Vec<(CandidatePair, Prediction)> {
    if pairs.len() != predictions.len() {
        let common = pairs.len().min(predictions.len());
        warn!(
            "Line count mismatch: {} candidate pairs vs {} predictions; truncating to {}",
            pairs.len(),
            predictions.len(),
            common
        );
        pairs.truncate(common);
        predictions.truncate(common);
    }
    pairs.into_iter().zip(predictions).collect()
}

/// Keeps predicted matches, scored by their confidence.
pub fn predicted_matches(aligned: Vec<(CandidatePair, Prediction)>) -> Vec<ScoredPair> {
    let total = aligned.len();
    let matches: Vec<ScoredPair> = aligned
        .into_iter()
        .filter(|(_, p)| p.is_match())
        .map(|(pair, p)| {
            let confidence = p.confidence();
            ScoredPair::new(pair, confidence)
        })
        .collect();
    info!("External classifier predicted {} matches out of {} pairs", matches.len(), total);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_match_and_target_keys() {
        let input = "{\"match\": 1, \"match_confidence\": 0.93}\n\n{\"target\": 0, \"match_confidence\": 0.8}\n{\"match\": 1}\n";
        let preds = parse_predictions(input.as_bytes(), "preds.jsonl").unwrap();
        assert_eq!(preds.len(), 3);
        assert!(preds[0].is_match());
        assert!(!preds[1].is_match());
        assert_eq!(preds[2].confidence(), 1.0);
    }

    #[test]
    fn malformed_line_reports_row() {
        let err = parse_predictions("{\"match\": 1}\nnot json\n".as_bytes(), "preds.jsonl").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinkageError>(),
            Some(LinkageError::MalformedInput { row: 2, .. })
        ));
    }

    #[test]
    fn mismatch_truncates_to_common_prefix() {
        let pairs = vec![
            CandidatePair::new("1", "10"),
            CandidatePair::new("2", "11"),
            CandidatePair::new("3", "12"),
        ];
        let preds = vec![
            Prediction { label: 1, match_confidence: Some(0.9) },
            Prediction { label: 0, match_confidence: Some(0.7) },
        ];
        let aligned = align_predictions(pairs, preds);
        assert_eq!(aligned.len(), 2);
        let matches = predicted_matches(aligned);
        assert_eq!(matches, vec![ScoredPair::new(CandidatePair::new("1", "10"), 0.9)]);
    }
}
