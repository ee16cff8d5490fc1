// src/bin/train_model.rs
use anyhow::{Context, Result};
use clap::Parser;
use linkage_lib::blocking::{block_with_strategy, BlockingLimits, BlockingStrategy};
use linkage_lib::io::ground_truth::VAL_FILE;
use linkage_lib::io::{load_ground_truth, load_optional_ground_truth};
use linkage_lib::models::GroundTruthEntry;
use linkage_lib::pipeline::load_sampled_tables;
use linkage_lib::rl::{ModelOrchestrator, TrainerConfig, TrainingInputs};
use linkage_lib::utils::config::{cap_from_arg, LinkageConfig};
use linkage_lib::utils::env::load_env;
use linkage_lib::utils::progress_bars::logging::{PipelineLogger, PipelineStage};
use log::info;
use std::path::PathBuf;

/// Trains and persists the classifier model for one blocking strategy.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct TrainArgs {
    #[arg(long)]
    strategy: Option<BlockingStrategy>,

    #[arg(long)]
    target_recall: Option<f64>,

    /// Per-class labeled example cap (0 disables)
    #[arg(long)]
    training_cap: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    gt_dir: Option<PathBuf>,

    #[arg(long)]
    models_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = TrainArgs::parse();
    let mut config = LinkageConfig::from_env().context("Failed to read linkage configuration")?;
    if let Some(strategy) = args.strategy {
        config.blocking_strategy = strategy;
    }
    if let Some(recall) = args.target_recall {
        config.target_recall = recall;
    }
    if let Some(cap) = args.training_cap {
        config.training_cap = cap_from_arg(cap);
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = args.gt_dir {
        config.paths.gt_dir = dir;
    }
    if let Some(dir) = args.models_dir {
        config.paths.models_dir = dir;
    }
    config.validate()?;

    let strategy = config.blocking_strategy;
    let logger = PipelineLogger::new(PipelineStage::Training);
    logger.log_start(&format!("strategy {}, target recall {:.2}", strategy, config.target_recall));

    let train_truth = load_ground_truth(&config.train_truth_path())?;
    let val_truth = load_optional_ground_truth(&config.paths.gt_dir.join(VAL_FILE))?;
    let keep: Vec<&[GroundTruthEntry]> = [Some(train_truth.as_slice()), val_truth.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let (left, right) = load_sampled_tables(&config, &keep)?;
    logger.log_phase("Records loaded", Some(&format!("{} left, {} right", left.len(), right.len())));

    let limits = BlockingLimits {
        bucket_cap: config.bucket_cap,
        seed: config.seed,
    };
    let blocked = block_with_strategy(left.records(), right.records(), strategy, &limits);
    logger.log_phase("Blocking complete", Some(&format!("{} candidates", blocked.candidates.len())));

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
    let inputs = TrainingInputs {
        left: &left,
        right: &right,
        candidates: &blocked.candidates,
        train_truth: &train_truth,
        holdout_truth: val_truth.as_deref(),
    };
    let model = orchestrator.load_or_train(true, Some(inputs))?;
    logger.log_completion(&format!("model written to {}", orchestrator.model_path.display()));
    info!("\n{}", model.stats_display());
    Ok(())
}
