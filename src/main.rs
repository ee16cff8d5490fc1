// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use linkage_lib::blocking::BlockingStrategy;
use linkage_lib::matching::{ClassifierKind, RuleWeights};
use linkage_lib::pipeline::{run_linkage, PIPELINE_STAGES};
use linkage_lib::utils::config::{cap_from_arg, LinkageConfig};
use linkage_lib::utils::env::load_env;
use linkage_lib::utils::get_memory_usage;
use linkage_lib::utils::progress_bars::progress_config::{create_main_bar, ProgressConfig};
use log::info;
use std::path::PathBuf;

/// Links vehicle listings across the left and right sources.
#[derive(Parser, Debug)]
#[command(name = "linkage", version, about)]
struct Args {
    /// Blocking strategy: make_year (b1), year_body (b2) or make_year_body
    #[arg(long)]
    strategy: Option<BlockingStrategy>,

    /// Classifier: rule or trained
    #[arg(long)]
    classifier: Option<ClassifierKind>,

    /// Override the classifier's own acceptance threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Rule classifier weight table, e.g. model=3,fuel_type=0.5
    #[arg(long = "rule_weights")]
    rule_weights: Option<RuleWeights>,

    #[arg(long)]
    target_recall: Option<f64>,

    /// Per-bucket per-side cap (0 disables)
    #[arg(long)]
    bucket_cap: Option<usize>,

    /// Per-source record sample cap (0 disables)
    #[arg(long)]
    sample_cap: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    workers: Option<usize>,

    /// Retrain the model even if one is persisted
    #[arg(long)]
    retrain: bool,

    #[arg(long)]
    left: Option<PathBuf>,

    #[arg(long)]
    right: Option<PathBuf>,

    #[arg(long)]
    gt_dir: Option<PathBuf>,

    #[arg(long)]
    results_dir: Option<PathBuf>,

    #[arg(long)]
    models_dir: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut LinkageConfig) {
        if let Some(strategy) = self.strategy {
            config.blocking_strategy = strategy;
        }
        if let Some(classifier) = self.classifier {
            config.classifier = classifier;
        }
        if self.threshold.is_some() {
            config.score_threshold = self.threshold;
        }
        if self.rule_weights.is_some() {
            config.rule_weights = self.rule_weights;
        }
        if let Some(recall) = self.target_recall {
            config.target_recall = recall;
        }
        if let Some(cap) = self.bucket_cap {
            config.bucket_cap = cap_from_arg(cap);
        }
        if let Some(cap) = self.sample_cap {
            config.sample_cap = cap_from_arg(cap);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.retrain |= self.retrain;
        if let Some(path) = self.left {
            config.paths.left = path;
        }
        if let Some(path) = self.right {
            config.paths.right = path;
        }
        if let Some(path) = self.gt_dir {
            config.paths.gt_dir = path;
        }
        if let Some(path) = self.results_dir {
            config.paths.results_dir = path;
        }
        if let Some(path) = self.models_dir {
            config.paths.models_dir = path;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging and environment
    env_logger::init();
    info!("Starting vehicle listing linkage pipeline");
    load_env();

    let args = Args::parse();
    let mut config = LinkageConfig::from_env().context("Failed to read linkage configuration")?;
    args.apply(&mut config);

    // Load progress configuration from environment
    let progress_config = ProgressConfig::from_env();
    info!(
        "Progress tracking: enabled={}, detailed={}",
        progress_config.enabled, progress_config.detailed
    );
    let multi_progress = progress_config.create_multi_progress();
    let main_pb = multi_progress.as_ref().map(|mp| {
        let pb = create_main_bar(mp, PIPELINE_STAGES);
        pb.set_message("Initializing pipeline...");
        pb
    });

    let summary = run_linkage(
        &config,
        progress_config.detailed_progress(&multi_progress),
        main_pb.clone(),
        progress_config.should_show_memory(),
    )
    .await?;

    if let Some(pb) = &main_pb {
        pb.finish_with_message(format!("Pipeline complete: {} matches", summary.accepted_matches));
    }
    if progress_config.should_show_memory() {
        info!("Final memory usage: {} MB", get_memory_usage());
    }
    info!("Pipeline completed successfully!");
    Ok(())
}
