// src/bin/report_model_weights.rs
use anyhow::{Context, Result};
use clap::Parser;
use linkage_lib::blocking::BlockingStrategy;
use linkage_lib::rl::Model;
use linkage_lib::utils::config::LinkageConfig;
use linkage_lib::utils::env::load_env;
use log::{info, warn};
use std::path::PathBuf;

/// Prints persisted model weights, threshold and calibration metrics.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ReportArgs {
    /// Report a single strategy; every strategy otherwise
    #[arg(long)]
    strategy: Option<BlockingStrategy>,

    #[arg(long)]
    models_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = ReportArgs::parse();
    let models_dir = match args.models_dir {
        Some(dir) => dir,
        None => LinkageConfig::from_env().context("Failed to read linkage configuration")?.paths.models_dir,
    };
    let strategies: Vec<BlockingStrategy> = match args.strategy {
        Some(strategy) => vec![strategy],
        None => BlockingStrategy::ALL.to_vec(),
    };

    info!("--- Model Weights Report ({}) ---", models_dir.display());
    let mut reported = 0usize;
    for strategy in strategies {
        let path = Model::path_for(&models_dir, strategy);
        if !path.exists() {
            warn!("No model for [{}] at {}", strategy, path.display());
            continue;
        }
        let model = Model::load(&path, strategy)?;
        println!("{}\n", model.stats_display());
        reported += 1;
    }
    info!("--- Reported {} model(s) ---", reported);
    Ok(())
}
