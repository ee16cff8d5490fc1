// src/utils/progress_bars/logging.rs - Stage-tagged logging helpers for linkage runs
use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::models::stats_models::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Loading,
    Blocking,
    Training,
    Classification,
    Resolution,
    Evaluation,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Loading => "LOADING",
            PipelineStage::Blocking => "BLOCKING",
            PipelineStage::Training => "TRAINING",
            PipelineStage::Classification => "CLASSIFICATION",
            PipelineStage::Resolution => "RESOLUTION",
            PipelineStage::Evaluation => "EVALUATION",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            PipelineStage::Loading => "📂",
            PipelineStage::Blocking => "🧱",
            PipelineStage::Training => "🎯",
            PipelineStage::Classification => "🧠",
            PipelineStage::Resolution => "🔗",
            PipelineStage::Evaluation => "📊",
        }
    }

    /// Key used for stage timings in the run summary.
    pub fn key(&self) -> &'static str {
        match self {
            PipelineStage::Loading => "loading",
            PipelineStage::Blocking => "blocking",
            PipelineStage::Training => "training",
            PipelineStage::Classification => "classification",
            PipelineStage::Resolution => "resolution",
            PipelineStage::Evaluation => "evaluation",
        }
    }
}

#[derive(Clone)]
pub struct PipelineLogger {
    stage: PipelineStage,
    start_time: Instant,
}

impl PipelineLogger {
    pub fn new(stage: PipelineStage) -> Self {
        Self {
            stage,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, details: &str) {
        info!(
            "[{}] {} 🚀 Starting {} ({})",
            self.stage.name(),
            self.stage.emoji(),
            self.stage.key(),
            details
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage.name(),
                self.stage.emoji(),
                phase,
                details,
                elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage.name(),
                self.stage.emoji(),
                phase,
                elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    /// Logs the stage outcome and returns its wall time in seconds.
    pub fn log_completion(&self, summary: &str) -> f64 {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} ✅ Completed in {:.2?}: {}",
            self.stage.name(),
            self.stage.emoji(),
            duration,
            summary
        );
        duration.as_secs_f64()
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage.name(), self.stage.emoji(), message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.stage.name(), self.stage.emoji(), message);
    }

    pub fn get_elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }
}

// Pipeline-level logging functions
pub fn log_pipeline_start(run_id: &str, strategy: &str, classifier: &str, workers: usize) {
    info!("🚀 ===== VEHICLE LINKAGE PIPELINE STARTING =====");
    info!("📅 Pipeline Run ID: {}", run_id);
    info!("   • Blocking strategy: {}", strategy);
    info!("   • Classifier: {}", classifier);
    info!("   • Scoring workers: {}", workers);
    info!("🎯 Stages: Loading 📂, Blocking 🧱, Training 🎯, Classification 🧠, Resolution 🔗, Evaluation 📊");
    info!("================================================");
}

pub fn log_pipeline_completion(summary: &RunSummary, duration: Duration) {
    info!("🎉 ===== VEHICLE LINKAGE PIPELINE COMPLETED =====");
    info!("📅 Pipeline Run ID: {}", summary.run_id);
    info!("⏱️  Total Duration: {:.2?}", duration);
    info!(
        "📈 Records: {} left, {} right → {} candidates ({} capped buckets)",
        summary.left_records, summary.right_records, summary.candidates, summary.capped_buckets
    );
    info!(
        "🧠 Scored {} pairs, {} at or above {:.4}, {} accepted 1:1 matches",
        summary.scored_pairs, summary.above_threshold, summary.score_threshold, summary.accepted_matches
    );
    for (stage, seconds) in &summary.stage_seconds {
        info!("   • {:<15} {:>8.2}s", stage, seconds);
    }
    info!("   • {:<15} {:>8.2}s", "stages total", summary.total_seconds());
    match &summary.evaluation {
        Some(report) => info!(
            "📊 Precision {:.4} | Recall {:.4} | F1 {:.4} (tp {}, fp {}, found {})",
            report.precision, report.recall, report.f1, report.tp, report.fp, report.found
        ),
        None => info!("📊 No test ground truth available; evaluation skipped"),
    }
    info!("================================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_keys_are_distinct() {
        let stages = [
            PipelineStage::Loading,
            PipelineStage::Blocking,
            PipelineStage::Training,
            PipelineStage::Classification,
            PipelineStage::Resolution,
            PipelineStage::Evaluation,
        ];
        let mut keys: Vec<&str> = stages.iter().map(|s| s.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), stages.len());
    }

    #[test]
    fn completion_reports_elapsed_seconds() {
        let logger = PipelineLogger::new(PipelineStage::Blocking);
        let seconds = logger.log_completion("0 candidates");
        assert!(seconds >= 0.0);
        assert_eq!(logger.stage(), PipelineStage::Blocking);
    }
}
