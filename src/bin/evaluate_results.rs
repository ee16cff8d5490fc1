// src/bin/evaluate_results.rs
use anyhow::{Context, Result};
use clap::Parser;
use linkage_lib::evaluation::{evaluate, log_report_table, sort_by_f1, write_report, EvaluationScope, REPORT_FILE_NAME};
use linkage_lib::io::ground_truth::TEST_FILE;
use linkage_lib::io::{load_ground_truth, load_pairs};
use linkage_lib::utils::config::LinkageConfig;
use linkage_lib::utils::env::load_env;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Evaluates every match-set CSV in the results directory against the test split.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct EvaluateArgs {
    #[arg(long)]
    results_dir: Option<PathBuf>,

    #[arg(long)]
    gt_dir: Option<PathBuf>,
}

fn result_files(results_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(results_dir)
        .with_context(|| format!("Failed to list {}", results_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "csv"))
        .filter(|path| path.file_name().map_or(true, |name| name != REPORT_FILE_NAME))
        .collect();
    files.sort();
    Ok(files)
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = EvaluateArgs::parse();
    let config = LinkageConfig::from_env().context("Failed to read linkage configuration")?;
    let results_dir = args.results_dir.unwrap_or(config.paths.results_dir);
    let gt_dir = args.gt_dir.unwrap_or(config.paths.gt_dir);

    let truth = load_ground_truth(&gt_dir.join(TEST_FILE))?;
    let scope = EvaluationScope::from_ground_truth(&truth);
    info!(
        "Evaluation scope: {} left ids, {} right ids, {} positives",
        scope.left_ids().len(),
        scope.right_ids().len(),
        truth.iter().filter(|e| e.is_positive()).count()
    );

    let mut reports = Vec::new();
    for path in result_files(&results_dir)? {
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match load_pairs(&path) {
            Ok(found) => reports.push(evaluate(&label, &found, &truth, &scope)),
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }
    if reports.is_empty() {
        warn!("No result files found in {}", results_dir.display());
    }

    sort_by_f1(&mut reports);
    log_report_table(&reports);
    write_report(&results_dir.join(REPORT_FILE_NAME), &reports)?;
    Ok(())
}
