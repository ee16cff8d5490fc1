// src/bin/import_predictions.rs
use anyhow::Result;
use clap::Parser;
use linkage_lib::external::{align_predictions, predicted_matches, read_predictions};
use linkage_lib::io::{load_pairs, write_match_set, write_scored_pairs};
use linkage_lib::matching::{filter_above, resolve};
use linkage_lib::utils::env::load_env;
use log::info;
use std::path::PathBuf;

/// Re-attaches ids to external classifier predictions and writes a match CSV.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ImportArgs {
    /// Id sidecar written by `export_pairs candidates`
    #[arg(long, default_value = "data/external/candidate_ids.csv")]
    ids: PathBuf,

    /// JSON-lines predictions, one per exported line
    #[arg(long)]
    predictions: PathBuf,

    #[arg(long, default_value = "data/results/matches_external.csv")]
    out: PathBuf,

    /// Drop predicted matches whose confidence is below this value
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Enforce 1:1 assignment over the predicted matches
    #[arg(long)]
    resolve: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();

    let args = ImportArgs::parse();
    let pairs = load_pairs(&args.ids)?;
    let predictions = read_predictions(&args.predictions)?;
    let mut matches = predicted_matches(align_predictions(pairs, predictions));
    if let Some(min) = args.min_confidence {
        matches = filter_above(matches, min);
    }

    if args.resolve {
        let resolved = resolve(matches);
        write_match_set(&args.out, &resolved)?;
        info!("Wrote {} resolved matches to {}", resolved.len(), args.out.display());
    } else {
        write_scored_pairs(&args.out, &matches)?;
        info!("Wrote {} predicted matches to {}", matches.len(), args.out.display());
    }
    Ok(())
}
