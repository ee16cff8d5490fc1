// src/bin/split_ground_truth.rs
use anyhow::Result;
use clap::Parser;
use linkage_lib::io::{load_ground_truth, split_ground_truth, write_split};
use linkage_lib::utils::config::DEFAULT_SEED;
use linkage_lib::utils::env::load_env;
use log::info;
use std::path::PathBuf;

/// Splits a ground-truth file 60/20/20 into train, val and test.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct SplitArgs {
    /// Full ground-truth CSV (left/right id columns, optional label)
    input: PathBuf,

    /// Directory receiving gt_train.csv, gt_val.csv and gt_test.csv
    #[arg(long, default_value = "data/gt")]
    gt_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = SplitArgs::parse();
    let entries = load_ground_truth(&args.input)?;
    let split = split_ground_truth(&entries, args.seed);
    let paths = write_split(&args.gt_dir, &split)?;
    for path in &paths {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
