// src/evaluation/report.rs
use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use std::path::Path;

use crate::models::EvaluationReport;

pub const REPORT_FILE_NAME: &str = "evaluation_report.csv";

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    model: &'a str,
    tp: usize,
    fp: usize,
    found: usize,
    precision: f64,
    recall: f64,
    f1: f64,
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Best F1 first; equal F1 falls back to label order.
pub fn sort_by_f1(reports: &mut [EvaluationReport]) {
    reports.sort_by(|a, b| b.f1.total_cmp(&a.f1).then_with(|| a.label.cmp(&b.label)));
}

pub fn write_report(path: &Path, reports: &[EvaluationReport]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create evaluation report {}", path.display()))?;
    if reports.is_empty() {
        writer
            .write_record(["model", "tp", "fp", "found", "precision", "recall", "f1"])
            .context("Failed to write evaluation header")?;
    }
    for report in reports {
        writer
            .serialize(ReportRow {
                model: &report.label,
                tp: report.tp,
                fp: report.fp,
                found: report.found,
                precision: round4(report.precision),
                recall: round4(report.recall),
                f1: round4(report.f1),
            })
            .context("Failed to write evaluation row")?;
    }
    writer.flush().context("Failed to flush evaluation report")?;
    info!("✅ Evaluation report saved to {}", path.display());
    Ok(())
}

pub fn log_report_table(reports: &[EvaluationReport]) {
    info!("{}", "=".repeat(96));
    info!("📊 EVALUATION REPORT");
    info!("{}", "=".repeat(96));
    info!(
        "{:<40} {:>6} {:>6} {:>7} {:>10} {:>8} {:>8}",
        "model", "tp", "fp", "found", "precision", "recall", "f1"
    );
    for r in reports {
        info!(
            "{:<40} {:>6} {:>6} {:>7} {:>10.4} {:>8.4} {:>8.4}",
            r.label, r.tp, r.fp, r.found, r.precision, r.recall, r.f1
        );
    }
    info!("{}", "=".repeat(96));
}
