// src/models/stats_models.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quality of one match set measured against ground truth inside a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub label: String,
    pub tp: usize,
    pub fp: usize,
    pub found: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Counts and stage timings for one `linkage` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub blocking_strategy: String,
    pub classifier: String,
    pub score_threshold: f64,
    pub left_records: usize,
    pub right_records: usize,
    pub candidates: usize,
    pub capped_buckets: usize,
    pub scored_pairs: usize,
    pub above_threshold: usize,
    pub accepted_matches: usize,
    pub evaluation: Option<EvaluationReport>,
    pub stage_seconds: BTreeMap<String, f64>,
}

impl RunSummary {
    pub fn new(run_id: String, run_timestamp: NaiveDateTime, blocking_strategy: &str, classifier: &str) -> Self {
        Self {
            run_id,
            run_timestamp,
            blocking_strategy: blocking_strategy.to_string(),
            classifier: classifier.to_string(),
            score_threshold: 0.0,
            left_records: 0,
            right_records: 0,
            candidates: 0,
            capped_buckets: 0,
            scored_pairs: 0,
            above_threshold: 0,
            accepted_matches: 0,
            evaluation: None,
            stage_seconds: BTreeMap::new(),
        }
    }

    pub fn record_stage(&mut self, stage: &str, seconds: f64) {
        self.stage_seconds.insert(stage.to_string(), seconds);
    }

    pub fn total_seconds(&self) -> f64 {
        self.stage_seconds.values().sum()
    }
}
