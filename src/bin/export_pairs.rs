// src/bin/export_pairs.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use linkage_lib::blocking::{block_with_strategy, BlockingLimits, BlockingStrategy};
use linkage_lib::external::{export_candidates, export_labeled};
use linkage_lib::io::ground_truth::{TEST_FILE, TRAIN_FILE, VAL_FILE};
use linkage_lib::io::{load_optional_ground_truth, load_records, write_pairs};
use linkage_lib::models::{GroundTruthEntry, Source};
use linkage_lib::pipeline::load_sampled_tables;
use linkage_lib::utils::config::LinkageConfig;
use linkage_lib::utils::env::load_env;
use log::{info, warn};
use std::path::PathBuf;

/// Serializes pairs into the line format of the external pair classifier.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ExportArgs {
    #[command(subcommand)]
    command: ExportCommand,
}

#[derive(Subcommand, Debug)]
enum ExportCommand {
    /// Blocked candidates, label placeholder 0, plus an id sidecar CSV
    Candidates {
        #[arg(long)]
        strategy: Option<BlockingStrategy>,

        /// Line file handed to the external classifier
        #[arg(long, default_value = "data/external/candidates.txt")]
        out: PathBuf,

        /// Ids of the written lines, in line order
        #[arg(long, default_value = "data/external/candidate_ids.csv")]
        ids: PathBuf,
    },
    /// Labeled train/val/test ground-truth splits
    GroundTruth {
        #[arg(long, default_value = "data/external")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = ExportArgs::parse();
    let mut config = LinkageConfig::from_env().context("Failed to read linkage configuration")?;

    match args.command {
        ExportCommand::Candidates { strategy, out, ids } => {
            if let Some(strategy) = strategy {
                config.blocking_strategy = strategy;
            }
            let test_truth = load_optional_ground_truth(&config.paths.gt_dir.join(TEST_FILE))?;
            let keep: Vec<&[GroundTruthEntry]> = test_truth.as_deref().into_iter().collect();
            let (left, right) = load_sampled_tables(&config, &keep)?;
            let limits = BlockingLimits {
                bucket_cap: config.bucket_cap,
                seed: config.seed,
            };
            let blocked = block_with_strategy(left.records(), right.records(), config.blocking_strategy, &limits);
            let (written, stats) = export_candidates(&out, &blocked.candidates, &left, &right)?;
            write_pairs(&ids, &written)?;
            info!(
                "Exported {} [{}] candidates to {} (ids in {})",
                stats.written,
                config.blocking_strategy,
                out.display(),
                ids.display()
            );
        }
        ExportCommand::GroundTruth { out_dir } => {
            let left = load_records(&config.paths.left, Source::Left)?;
            let right = load_records(&config.paths.right, Source::Right)?;
            for (file, name) in [(TRAIN_FILE, "train.txt"), (VAL_FILE, "val.txt"), (TEST_FILE, "test.txt")] {
                let path = config.paths.gt_dir.join(file);
                match load_optional_ground_truth(&path)? {
                    Some(truth) => {
                        export_labeled(&out_dir.join(name), &truth, &left, &right)?;
                    }
                    None => warn!("No ground truth at {}; skipping", path.display()),
                }
            }
        }
    }
    Ok(())
}
