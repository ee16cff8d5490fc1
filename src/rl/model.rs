// src/rl/model.rs
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::blocking::BlockingStrategy;
use crate::error::LinkageError;
use crate::models::{FeatureVector, Field, LabeledExample};

pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Everything needed to rebuild the trained classifier without retraining.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    pub format_version: u32,
    pub strategy: BlockingStrategy,
    /// Feature order; `weights[i]` belongs to `fields[i]`.
    pub fields: Vec<Field>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub threshold: f64,
    pub target_recall: f64,
    pub achieved_precision: f64,
    pub achieved_recall: f64,
    pub under_target: bool,
    pub seed: u64,
    pub fingerprint: String,
    pub examples: Vec<LabeledExample>,
    pub trained_at: NaiveDateTime,
}

impl Model {
    pub fn weight(&self, field: Field) -> Option<f64> {
        self.fields
            .iter()
            .position(|f| *f == field)
            .map(|i| self.weights[i])
    }

    /// Match probability for one vector. Fields the vector lacks read as 0.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let logit: f64 = self
            .fields
            .iter()
            .zip(&self.weights)
            .map(|(field, w)| w * features.value(*field))
            .sum::<f64>()
            + self.bias;
        sigmoid(logit)
    }

    pub fn path_for(models_dir: &Path, strategy: BlockingStrategy) -> PathBuf {
        models_dir.join(format!("model_{}.json", strategy.id()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create model directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize model")?;
        fs::write(path, json).with_context(|| format!("Failed to write model to {}", path.display()))?;
        info!(
            "Saved [{}] model v{} to {} (threshold {:.4})",
            self.strategy,
            self.format_version,
            path.display(),
            self.threshold
        );
        Ok(())
    }

    /// Reads a model and checks it was calibrated for `expected`.
    pub fn load(path: &Path, expected: BlockingStrategy) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Failed to read model {}", path.display()))?;
        let model: Model = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model {}", path.display()))?;

        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(LinkageError::ModelVersion {
                found: model.format_version,
                expected: MODEL_FORMAT_VERSION,
            }
            .into());
        }
        if model.strategy != expected {
            return Err(LinkageError::ModelStrategyMismatch {
                path: path.to_path_buf(),
                expected: expected.id().to_string(),
                found: model.strategy.id().to_string(),
            }
            .into());
        }
        if model.fields.len() != model.weights.len() {
            return Err(LinkageError::InvalidConfig(format!(
                "model {} has {} fields but {} weights",
                path.display(),
                model.fields.len(),
                model.weights.len()
            ))
            .into());
        }
        if model.under_target {
            warn!(
                "Loaded [{}] model is under target: recall {:.4} < {:.4}",
                model.strategy, model.achieved_recall, model.target_recall
            );
        }
        info!(
            "Loaded [{}] model from {} (trained {}, {} examples)",
            model.strategy,
            path.display(),
            model.trained_at,
            model.examples.len()
        );
        Ok(model)
    }

    pub fn stats_display(&self) -> String {
        let mut lines = vec![format!(
            "Model [{}] v{} trained {} | threshold {:.4} | precision {:.4} recall {:.4} (target {:.2}){}",
            self.strategy,
            self.format_version,
            self.trained_at,
            self.threshold,
            self.achieved_precision,
            self.achieved_recall,
            self.target_recall,
            if self.under_target { " UNDER TARGET" } else { "" }
        )];
        for (field, weight) in self.fields.iter().zip(&self.weights) {
            lines.push(format!("  {:<14} {:>9.4}", field.as_str(), weight));
        }
        lines.push(format!("  {:<14} {:>9.4}", "bias", self.bias));
        lines.push(format!(
            "  examples {} | seed {} | fingerprint {}",
            self.examples.len(),
            self.seed,
            self.fingerprint
        ));
        lines.join("\n")
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// SHA-256 over the sorted example set; identical sets share a fingerprint
/// regardless of input order.
pub fn fingerprint(examples: &[LabeledExample]) -> String {
    let mut sorted: Vec<&LabeledExample> = examples.iter().collect();
    sorted.sort();
    let mut hasher = Sha256::new();
    for example in sorted {
        hasher.update(example.pair.left_id.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(example.pair.right_id.as_str().as_bytes());
        hasher.update([0x1f, example.label.as_flag(), b'\n']);
    }
    hex::encode(hasher.finalize())
}
