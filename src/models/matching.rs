// src/models/matching.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::core::{Field, RecordId};

/// A same-block (left, right) pair eligible for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidatePair {
    pub left_id: RecordId,
    pub right_id: RecordId,
}

impl CandidatePair {
    pub fn new(left_id: impl Into<RecordId>, right_id: impl Into<RecordId>) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
        }
    }
}

/// Per-field similarity; `Missing` is the non-match sentinel used when either
/// side lacks a comparable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    Score(f64),
    Missing,
}

impl Similarity {
    pub fn value(&self) -> f64 {
        match self {
            Similarity::Score(s) => *s,
            Similarity::Missing => 0.0,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Similarity::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSimilarity {
    pub field: Field,
    pub similarity: Similarity,
    /// Acceptance threshold for free-text fields. The raw score is always kept;
    /// classifiers that want a binary signal apply this themselves.
    pub acceptance: Option<f64>,
}

impl FieldSimilarity {
    pub fn binarized(&self) -> f64 {
        match (self.similarity, self.acceptance) {
            (Similarity::Missing, _) => 0.0,
            (Similarity::Score(s), Some(t)) => {
                if s >= t {
                    1.0
                } else {
                    0.0
                }
            }
            (Similarity::Score(s), None) => s,
        }
    }
}

/// Fixed-shape similarity measurements for one candidate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub pair: CandidatePair,
    pub fields: Vec<FieldSimilarity>,
}

impl FeatureVector {
    pub fn get(&self, field: Field) -> Option<&FieldSimilarity> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// Numeric view of one field; absent or missing both read as 0.0.
    pub fn value(&self, field: Field) -> f64 {
        self.get(field).map(|f| f.similarity.value()).unwrap_or(0.0)
    }

    pub fn field_names(&self) -> Vec<Field> {
        self.fields.iter().map(|f| f.field).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Match,
    Distinct,
}

impl Label {
    pub fn from_flag(flag: u8) -> Self {
        if flag == 1 {
            Label::Match
        } else {
            Label::Distinct
        }
    }

    pub fn as_flag(&self) -> u8 {
        match self {
            Label::Match => 1,
            Label::Distinct => 0,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Label::Match)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabeledExample {
    pub pair: CandidatePair,
    pub label: Label,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub pair: CandidatePair,
    pub score: f64,
}

impl ScoredPair {
    pub fn new(pair: CandidatePair, score: f64) -> Self {
        Self { pair, score }
    }
}

/// Accepted pairs where every left id and every right id appears at most once.
/// Only the assignment resolver constructs one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchSet {
    pairs: Vec<ScoredPair>,
}

impl MatchSet {
    pub(crate) fn from_accepted(pairs: Vec<ScoredPair>) -> Self {
        debug_assert!({
            let mut lefts = HashSet::new();
            let mut rights = HashSet::new();
            pairs
                .iter()
                .all(|p| lefts.insert(&p.pair.left_id) && rights.insert(&p.pair.right_id))
        });
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ScoredPair] {
        &self.pairs
    }

    pub fn candidate_pairs(&self) -> impl Iterator<Item = &CandidatePair> {
        self.pairs.iter().map(|p| &p.pair)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_pairs(self) -> Vec<ScoredPair> {
        self.pairs
    }
}

/// One externally supplied ground-truth row; label is 1 for match, 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundTruthEntry {
    pub left_id: RecordId,
    pub right_id: RecordId,
    pub label: u8,
}

impl GroundTruthEntry {
    pub fn new(left_id: impl Into<RecordId>, right_id: impl Into<RecordId>, label: u8) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
            label,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.label == 1
    }

    pub fn pair(&self) -> CandidatePair {
        CandidatePair::new(self.left_id.clone(), self.right_id.clone())
    }
}
