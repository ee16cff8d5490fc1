// src/rl/orchestrator.rs
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::blocking::BlockingStrategy;
use crate::error::LinkageError;
use crate::models::{CandidatePair, GroundTruthEntry, RecordTable};
use crate::rl::labeled::{build_labeled_examples, featurize_examples};
use crate::rl::model::Model;
use crate::rl::trainer::{train, TrainerConfig};

/// Records, blocked candidates and ground truth a training run draws from.
pub struct TrainingInputs<'a> {
    pub left: &'a RecordTable,
    pub right: &'a RecordTable,
    pub candidates: &'a [CandidatePair],
    pub train_truth: &'a [GroundTruthEntry],
    pub holdout_truth: Option<&'a [GroundTruthEntry]>,
}

/// Owns the persisted model location for one blocking strategy.
pub struct ModelOrchestrator {
    pub strategy: BlockingStrategy,
    pub model_path: PathBuf,
    pub trainer: TrainerConfig,
    pub training_cap: Option<usize>,
}

impl ModelOrchestrator {
    pub fn new(models_dir: &Path, strategy: BlockingStrategy, trainer: TrainerConfig, training_cap: Option<usize>) -> Self {
        Self {
            strategy,
            model_path: Model::path_for(models_dir, strategy),
            trainer,
            training_cap,
        }
    }

    pub fn model_exists(&self) -> bool {
        self.model_path.exists()
    }

    /// Reuses the persisted model unless `retrain` is set or none exists.
    /// Training inputs are only needed when training actually happens.
    pub fn load_or_train(&self, retrain: bool, inputs: Option<TrainingInputs<'_>>) -> Result<Model> {
        if !retrain && self.model_exists() {
            return Model::load(&self.model_path, self.strategy);
        }
        let Some(inputs) = inputs else {
            return Err(LinkageError::ModelRequired {
                strategy: self.strategy.id().to_string(),
                path: self.model_path.clone(),
            }
            .into());
        };
        if retrain && self.model_exists() {
            info!("Retraining requested; replacing {}", self.model_path.display());
        }
        let model = self.train(inputs)?;
        model
            .save(&self.model_path)
            .with_context(|| format!("Failed to persist [{}] model", self.strategy))?;
        Ok(model)
    }

    pub fn train(&self, inputs: TrainingInputs<'_>) -> Result<Model> {
        let plan = self.strategy.comparison_plan();
        let seed = self.trainer.seed;

        let training_set = build_labeled_examples(
            inputs.train_truth,
            inputs.left,
            inputs.right,
            inputs.candidates,
            self.training_cap,
            seed,
            "train",
        );
        let training = featurize_examples(&training_set.examples, inputs.left, inputs.right, &plan);

        let holdout = match inputs.holdout_truth {
            Some(truth) if !truth.is_empty() => {
                let holdout_set = build_labeled_examples(
                    truth,
                    inputs.left,
                    inputs.right,
                    inputs.candidates,
                    self.training_cap,
                    seed,
                    "holdout",
                );
                let vectors = featurize_examples(&holdout_set.examples, inputs.left, inputs.right, &plan);
                if vectors.is_empty() {
                    warn!("Holdout ground truth produced no usable examples; calibrating on training set");
                    None
                } else {
                    Some(vectors)
                }
            }
            _ => None,
        };

        let model = train(
            self.strategy,
            &plan.fields(),
            &training,
            holdout.as_deref(),
            &self.trainer,
        )
        .with_context(|| format!("Training [{}] model failed", self.strategy))?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::{block_with_strategy, BlockingLimits};
    use crate::models::{Field, Record, Source};
    use tempfile::tempdir;

    fn car(id: &str, source: Source, model: &str) -> Record {
        Record::new(id, source)
            .with(Field::Make, "vw")
            .with(Field::Model, model)
            .with(Field::Year, "2017")
    }

    fn fixture() -> (RecordTable, RecordTable, Vec<GroundTruthEntry>) {
        let models = ["golf", "polo", "passat", "tiguan", "touran", "arteon"];
        let left = RecordTable::new(
            Source::Left,
            models.iter().enumerate().map(|(i, m)| car(&format!("l{}", i), Source::Left, m)).collect(),
        );
        let right = RecordTable::new(
            Source::Right,
            models.iter().enumerate().map(|(i, m)| car(&format!("r{}", i), Source::Right, m)).collect(),
        );
        let gt = (0..models.len())
            .map(|i| GroundTruthEntry::new(format!("l{}", i).as_str(), format!("r{}", i).as_str(), 1))
            .collect();
        (left, right, gt)
    }

    #[test]
    fn trains_once_then_reuses_persisted_model() {
        let dir = tempdir().unwrap();
        let (left, right, gt) = fixture();
        let blocked = block_with_strategy(
            left.records(),
            right.records(),
            BlockingStrategy::MakeYear,
            &BlockingLimits::default(),
        );
        let orchestrator = ModelOrchestrator::new(dir.path(), BlockingStrategy::MakeYear, TrainerConfig::default(), Some(750));

        let inputs = TrainingInputs {
            left: &left,
            right: &right,
            candidates: &blocked.candidates,
            train_truth: &gt,
            holdout_truth: None,
        };
        let trained = orchestrator.load_or_train(false, Some(inputs)).unwrap();
        assert!(orchestrator.model_exists());
        assert!(trained.weight(Field::Model).unwrap() > 0.0);

        let reused = orchestrator.load_or_train(false, None).unwrap();
        assert_eq!(reused.fingerprint, trained.fingerprint);
        assert_eq!(reused.weights, trained.weights);
    }

    #[test]
    fn missing_model_without_inputs_is_fatal() {
        let dir = tempdir().unwrap();
        let orchestrator = ModelOrchestrator::new(dir.path(), BlockingStrategy::YearBody, TrainerConfig::default(), None);
        let err = orchestrator.load_or_train(false, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinkageError>(),
            Some(LinkageError::ModelRequired { .. })
        ));
    }
}
