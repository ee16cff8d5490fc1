// src/pipeline.rs - One end-to-end linkage run
use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar};
use log::{info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::blocking::{block_with_strategy, derive_seed, sample_records, BlockingLimits, BlockingStrategy};
use crate::evaluation::{evaluate, EvaluationScope};
use crate::io::ground_truth::{TEST_FILE, VAL_FILE};
use crate::io::{load_ground_truth, load_optional_ground_truth, load_records, write_match_set};
use crate::matching::{build_classifier, filter_above, resolve, score_candidates, ClassifierKind};
use crate::models::{GroundTruthEntry, RecordId, RecordTable, RunSummary, Source};
use crate::rl::{ModelOrchestrator, TrainerConfig, TrainingInputs};
use crate::utils::config::LinkageConfig;
use crate::utils::get_memory_usage;
use crate::utils::progress_bars::logging::{
    log_pipeline_completion, log_pipeline_start, PipelineLogger, PipelineStage,
};
use crate::utils::run::RunContext;

pub const PIPELINE_STAGES: u64 = 6;

/// `matches_<classifier>_<strategy>.csv`
pub fn match_file_name(classifier: ClassifierKind, strategy: BlockingStrategy) -> String {
    format!("matches_{}_{}.csv", classifier, strategy)
}

pub fn run_summary_path(results_dir: &Path, strategy: BlockingStrategy, run_id: &str) -> PathBuf {
    results_dir.join(format!("run_{}_{}.json", strategy, run_id))
}

fn advance(main_pb: &Option<ProgressBar>, message: &str, show_memory: bool) {
    if let Some(pb) = main_pb {
        pb.inc(1);
        if show_memory {
            pb.set_message(format!("{} (Memory: {} MB)", message, get_memory_usage()));
        } else {
            pb.set_message(message.to_string());
        }
    }
}

/// Loads, blocks, classifies, resolves and evaluates according to `config`,
/// writing the match set and a run summary into the results directory.
pub async fn run_linkage(
    config: &LinkageConfig,
    multi_progress: Option<MultiProgress>,
    main_pb: Option<ProgressBar>,
    show_memory: bool,
) -> Result<RunSummary> {
    config.validate()?;
    config.log_config();

    let run = RunContext::new();
    let pipeline_start = Instant::now();
    let strategy = config.blocking_strategy;
    log_pipeline_start(&run.run_id, strategy.id(), config.classifier.as_str(), config.workers);
    let mut summary = RunSummary::new(
        run.run_id.clone(),
        run.run_timestamp,
        strategy.id(),
        config.classifier.as_str(),
    );

    // Phase 1: records and ground truth
    let logger = PipelineLogger::new(PipelineStage::Loading);
    logger.log_start(&format!(
        "{} / {}",
        config.paths.left.display(),
        config.paths.right.display()
    ));
    let test_truth = load_optional_ground_truth(&config.paths.gt_dir.join(TEST_FILE))?;
    if test_truth.is_none() {
        logger.log_warning("No test ground truth found; the run will not be evaluated");
    }
    let scope = test_truth.as_deref().map(EvaluationScope::from_ground_truth);

    let needs_training = config.classifier == ClassifierKind::Trained
        && (config.retrain || !config.model_path().exists());
    let (train_truth, val_truth) = if needs_training {
        let train = load_ground_truth(&config.train_truth_path())?;
        let val = load_optional_ground_truth(&config.paths.gt_dir.join(VAL_FILE))?;
        (Some(train), val)
    } else {
        (None, None)
    };

    // Every id the run may be judged or trained on survives sampling.
    let keep_slices: Vec<&[GroundTruthEntry]> = [test_truth.as_deref(), train_truth.as_deref(), val_truth.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let (left, right) = load_sampled_tables(config, &keep_slices)?;
    summary.left_records = left.len();
    summary.right_records = right.len();
    let seconds = logger.log_completion(&format!("{} left, {} right records", left.len(), right.len()));
    summary.record_stage(PipelineStage::Loading.key(), seconds);
    advance(&main_pb, "Records loaded", show_memory);

    // Phase 2: blocking
    let logger = PipelineLogger::new(PipelineStage::Blocking);
    logger.log_start(strategy.id());
    let limits = BlockingLimits {
        bucket_cap: config.bucket_cap,
        seed: config.seed,
    };
    let blocked = block_with_strategy(left.records(), right.records(), strategy, &limits);
    summary.candidates = blocked.stats.candidates;
    summary.capped_buckets = blocked.stats.capped_buckets;
    let seconds = logger.log_completion(&format!(
        "{} candidates from {} shared buckets ({} capped)",
        blocked.stats.candidates, blocked.stats.shared_buckets, blocked.stats.capped_buckets
    ));
    summary.record_stage(PipelineStage::Blocking.key(), seconds);
    advance(&main_pb, "Blocking complete", show_memory);

    // Phase 3: model, only for the trained classifier
    let model = if config.classifier == ClassifierKind::Trained {
        let logger = PipelineLogger::new(PipelineStage::Training);
        logger.log_start(&config.model_path().display().to_string());
        let orchestrator = ModelOrchestrator::new(
            &config.paths.models_dir,
            strategy,
            TrainerConfig {
                target_recall: config.target_recall,
                seed: config.seed,
                ..TrainerConfig::default()
            },
            config.training_cap,
        );
        let inputs = train_truth.as_deref().map(|train| TrainingInputs {
            left: &left,
            right: &right,
            candidates: &blocked.candidates,
            train_truth: train,
            holdout_truth: val_truth.as_deref(),
        });
        let model = orchestrator
            .load_or_train(config.retrain, inputs)
            .context("Failed to obtain trained classifier model")?;
        logger.log_debug(&format!(
            "model {} ready after {:.2?}",
            model.fingerprint,
            logger.get_elapsed()
        ));
        if model.under_target {
            logger.log_warning(&format!(
                "Calibrated recall {:.4} is below target {:.2}",
                model.achieved_recall, model.target_recall
            ));
        }
        let seconds = logger.log_completion(&format!("threshold {:.4}", model.threshold));
        summary.record_stage(PipelineStage::Training.key(), seconds);
        Some(model)
    } else {
        None
    };
    advance(&main_pb, "Classifier ready", show_memory);

    let classifier = build_classifier(
        config.classifier,
        strategy,
        config.rule_weights.as_ref(),
        model,
        &config.model_path(),
    )?;
    let threshold = config
        .score_threshold
        .unwrap_or_else(|| classifier.default_threshold());
    summary.score_threshold = threshold;

    // Phase 4: comparison and classification
    let logger = PipelineLogger::new(PipelineStage::Classification);
    logger.log_start(&format!("{} candidates, threshold {:.4}", blocked.candidates.len(), threshold));
    let left = Arc::new(left);
    let right = Arc::new(right);
    let scored = score_candidates(
        blocked.candidates,
        left.clone(),
        right.clone(),
        strategy.comparison_plan(),
        classifier,
        config.workers,
        multi_progress,
    )
    .await
    .context("Scoring candidate pairs failed")?;
    summary.scored_pairs = scored.len();
    let seconds = logger.log_completion(&format!("{} pairs scored", scored.len()));
    summary.record_stage(PipelineStage::Classification.key(), seconds);
    advance(&main_pb, "Scoring complete", show_memory);

    // Phase 5: threshold and 1:1 resolution
    let logger = PipelineLogger::new(PipelineStage::Resolution);
    logger.log_start(&format!("{} scored pairs", scored.len()));
    let above = filter_above(scored, threshold);
    summary.above_threshold = above.len();
    let matches = resolve(above);
    summary.accepted_matches = matches.len();

    let match_path = config
        .paths
        .results_dir
        .join(match_file_name(config.classifier, strategy));
    write_match_set(&match_path, &matches)?;
    let seconds = logger.log_completion(&format!(
        "{} above threshold, {} accepted, written to {}",
        summary.above_threshold,
        summary.accepted_matches,
        match_path.display()
    ));
    summary.record_stage(PipelineStage::Resolution.key(), seconds);
    advance(&main_pb, "Resolution complete", show_memory);

    // Phase 6: evaluation in the test scope
    if let (Some(truth), Some(scope)) = (test_truth.as_deref(), scope.as_ref()) {
        let logger = PipelineLogger::new(PipelineStage::Evaluation);
        logger.log_start(&format!("{} test ground-truth rows", truth.len()));
        let label = format!("{}_{}", config.classifier, strategy);
        let report = evaluate(&label, matches.candidate_pairs(), truth, scope);
        let seconds = logger.log_completion(&format!(
            "precision {:.4}, recall {:.4}, f1 {:.4}",
            report.precision, report.recall, report.f1
        ));
        summary.record_stage(PipelineStage::Evaluation.key(), seconds);
        summary.evaluation = Some(report);
    } else {
        warn!("Evaluation skipped: no test ground truth");
    }
    advance(&main_pb, "Evaluation complete", show_memory);

    write_run_summary(&config.paths.results_dir, strategy, &summary)?;
    log_pipeline_completion(&summary, pipeline_start.elapsed());
    Ok(summary)
}

/// Loads both sources and caps each at the configured sample size, keeping
/// every record named by `keep`.
pub fn load_sampled_tables(config: &LinkageConfig, keep: &[&[GroundTruthEntry]]) -> Result<(RecordTable, RecordTable)> {
    let left = load_records(&config.paths.left, Source::Left)?;
    let right = load_records(&config.paths.right, Source::Right)?;
    let (keep_left, keep_right) = ground_truth_ids(keep);
    let left = RecordTable::new(
        Source::Left,
        sample_records(
            left.into_records(),
            config.sample_cap,
            &keep_left,
            derive_seed(config.seed, &["sample", Source::Left.as_str()]),
        ),
    );
    let right = RecordTable::new(
        Source::Right,
        sample_records(
            right.into_records(),
            config.sample_cap,
            &keep_right,
            derive_seed(config.seed, &["sample", Source::Right.as_str()]),
        ),
    );
    Ok((left, right))
}

pub fn write_run_summary(results_dir: &Path, strategy: BlockingStrategy, summary: &RunSummary) -> Result<PathBuf> {
    fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create results directory {}", results_dir.display()))?;
    let path = run_summary_path(results_dir, strategy, &summary.run_id);
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    fs::write(&path, json).with_context(|| format!("Failed to write run summary {}", path.display()))?;
    info!("Run summary written to {}", path.display());
    Ok(path)
}

/// Ids named by any of the given ground-truth slices, per side.
pub fn ground_truth_ids(slices: &[&[GroundTruthEntry]]) -> (HashSet<RecordId>, HashSet<RecordId>) {
    let mut left = HashSet::new();
    let mut right = HashSet::new();
    for slice in slices {
        for entry in slice.iter() {
            left.insert(entry.left_id.clone());
            right.insert(entry.right_id.clone());
        }
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_follow_classifier_and_strategy() {
        assert_eq!(
            match_file_name(ClassifierKind::Rule, BlockingStrategy::MakeYear),
            "matches_rule_make_year.csv"
        );
        let path = run_summary_path(Path::new("out"), BlockingStrategy::YearBody, "abc");
        assert_eq!(path, PathBuf::from("out/run_year_body_abc.json"));
    }

    #[test]
    fn ground_truth_ids_cover_every_slice() {
        let a = vec![GroundTruthEntry::new("1", "10", 1)];
        let b = vec![GroundTruthEntry::new("2", "11", 0)];
        let (left, right) = ground_truth_ids(&[&a, &b]);
        assert_eq!(left.len(), 2);
        assert!(right.contains(&RecordId::from("11")));
    }
}
