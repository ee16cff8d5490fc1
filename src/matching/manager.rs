// src/matching/manager.rs - Sharded comparison and scoring of candidate pairs
use anyhow::{Context, Result};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::matching::classifier::Classifier;
use crate::matching::comparator::{ComparisonPlan, FeatureComparator};
use crate::models::{CandidatePair, FeatureVector, RecordTable, ScoredPair};

/// Pairs per progress-bar tick inside a worker.
const PROGRESS_STEP: usize = 1_000;

/// Comparator + classifier over every candidate, split into `workers`
/// contiguous chunks on blocking threads. Chunks are joined in order, so the
/// result matches a sequential pass. Pairs whose endpoint is not in the
/// tables are skipped with a warning.
pub async fn score_candidates(
    candidates: Vec<CandidatePair>,
    left: Arc<RecordTable>,
    right: Arc<RecordTable>,
    plan: ComparisonPlan,
    classifier: Arc<dyn Classifier>,
    workers: usize,
    multi_progress: Option<MultiProgress>,
) -> Result<Vec<ScoredPair>> {
    let start = Instant::now();
    let total = candidates.len();
    if total == 0 {
        info!("Scoring: no candidate pairs to score");
        return Ok(Vec::new());
    }

    let workers = workers.max(1).min(total);
    let chunk_size = (total + workers - 1) / workers;
    info!(
        "Scoring {} candidate pairs with '{}' classifier across {} workers (chunk size {})",
        total,
        classifier.name(),
        workers,
        chunk_size
    );

    let scoring_pb = multi_progress.as_ref().map(|mp| {
        let pb = mp.add(ProgressBar::new(total as u64));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.blue} [{elapsed_precise}] {bar:30.green/white} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        pb.set_message("Comparing and scoring pairs...");
        pb
    });

    let mut handles = Vec::with_capacity(workers);
    let mut remaining = candidates;
    let mut chunk_index = 0usize;
    while !remaining.is_empty() {
        let rest = remaining.split_off(chunk_size.min(remaining.len()));
        let chunk = std::mem::replace(&mut remaining, rest);
        let left = Arc::clone(&left);
        let right = Arc::clone(&right);
        let plan = plan.clone();
        let classifier = Arc::clone(&classifier);
        let pb = scoring_pb.clone();
        let index = chunk_index;
        handles.push(tokio::task::spawn_blocking(move || {
            score_chunk(index, chunk, &left, &right, plan, classifier.as_ref(), pb.as_ref())
        }));
        chunk_index += 1;
    }

    let mut scored = Vec::with_capacity(total);
    let mut skipped = 0usize;
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        let (chunk_scored, chunk_skipped) =
            joined.with_context(|| format!("Scoring worker {} panicked", index))?;
        scored.extend(chunk_scored);
        skipped += chunk_skipped;
    }

    if skipped > 0 {
        warn!("Scoring: skipped {} pairs referencing unknown record ids", skipped);
    }
    if let Some(pb) = scoring_pb {
        pb.finish_with_message(format!("Scored {} pairs", scored.len()));
    }
    info!(
        "Scoring complete: {} pairs scored in {:.2?}",
        scored.len(),
        start.elapsed()
    );
    Ok(scored)
}

fn score_chunk(
    index: usize,
    chunk: Vec<CandidatePair>,
    left: &RecordTable,
    right: &RecordTable,
    plan: ComparisonPlan,
    classifier: &dyn Classifier,
    pb: Option<&ProgressBar>,
) -> (Vec<ScoredPair>, usize) {
    let mut comparator = FeatureComparator::new(plan);
    let mut scored = Vec::with_capacity(chunk.len());
    let mut skipped = 0usize;
    let mut since_tick = 0usize;

    for pair in chunk {
        match (left.get(&pair.left_id), right.get(&pair.right_id)) {
            (Some(l), Some(r)) => {
                let features = comparator.compare(&pair, l, r);
                let score = classifier.score(&features);
                scored.push(ScoredPair::new(pair, score));
            }
            _ => skipped += 1,
        }
        since_tick += 1;
        if since_tick == PROGRESS_STEP {
            if let Some(pb) = pb {
                pb.inc(since_tick as u64);
            }
            since_tick = 0;
        }
    }
    if let Some(pb) = pb {
        pb.inc(since_tick as u64);
    }
    let (hits, misses) = comparator.cache_stats();
    debug!(
        "Scoring worker {}: {} pairs, text cache {} hits / {} misses",
        index,
        scored.len(),
        hits,
        misses
    );
    (scored, skipped)
}

/// Sequential comparison used by the trainer, where inputs are small and
/// vectors (not scores) are needed.
pub fn featurize_pairs(
    pairs: &[CandidatePair],
    left: &RecordTable,
    right: &RecordTable,
    plan: &ComparisonPlan,
) -> Vec<FeatureVector> {
    let mut comparator = FeatureComparator::new(plan.clone());
    pairs
        .iter()
        .filter_map(|pair| {
            let l = left.get(&pair.left_id)?;
            let r = right.get(&pair.right_id)?;
            Some(comparator.compare(pair, l, r))
        })
        .collect()
}
