// src/matching/classifier.rs
use log::info;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::blocking::BlockingStrategy;
use crate::error::LinkageError;
use crate::models::{FeatureVector, Field};
use crate::rl::model::Model;

pub const RULE_DEFAULT_THRESHOLD: f64 = 0.75;

/// Maps a feature vector to a match score in [0, 1].
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, features: &FeatureVector) -> f64;
    /// Cutoff used when the run does not configure one.
    fn default_threshold(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    Rule,
    Trained,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierKind::Rule => "rule",
            ClassifierKind::Trained => "trained",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = LinkageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" | "rules" => Ok(ClassifierKind::Rule),
            "trained" | "learned" => Ok(ClassifierKind::Trained),
            _ => Err(LinkageError::UnknownClassifier(s.to_string())),
        }
    }
}

/// A `field=weight` table such as `model=3,fuel_type=0.5`, as read from
/// `LINKAGE_RULE_WEIGHTS` or `--rule_weights`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleWeights(Vec<(Field, f64)>);

impl RuleWeights {
    pub fn new(weights: Vec<(Field, f64)>) -> Result<Self, LinkageError> {
        if weights.is_empty() {
            return Err(LinkageError::InvalidConfig("rule weight table is empty".to_string()));
        }
        for (i, (field, weight)) in weights.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(LinkageError::InvalidConfig(format!(
                    "rule weight for '{}' must be finite and non-negative, got {}",
                    field, weight
                )));
            }
            if weights[..i].iter().any(|(seen, _)| seen == field) {
                return Err(LinkageError::InvalidConfig(format!(
                    "rule weight for '{}' is given twice",
                    field
                )));
            }
        }
        if weights.iter().all(|(_, w)| *w == 0.0) {
            return Err(LinkageError::InvalidConfig("rule weights must not all be zero".to_string()));
        }
        Ok(Self(weights))
    }

    pub fn as_slice(&self) -> &[(Field, f64)] {
        &self.0
    }
}

impl fmt::Display for RuleWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<String> = self.0.iter().map(|(field, w)| format!("{}={}", field, w)).collect();
        f.write_str(&entries.join(","))
    }
}

impl FromStr for RuleWeights {
    type Err = LinkageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut weights = Vec::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (field, weight) = entry.split_once('=').ok_or_else(|| {
                LinkageError::InvalidConfig(format!("rule weight '{}' is not of the form field=weight", entry))
            })?;
            let field = field
                .parse::<Field>()
                .map_err(|e| LinkageError::InvalidConfig(format!("rule weights: {}", e)))?;
            let weight = weight.trim().parse::<f64>().map_err(|e| {
                LinkageError::InvalidConfig(format!("rule weight for '{}' ('{}'): {}", field, weight.trim(), e))
            })?;
            weights.push((field, weight));
        }
        Self::new(weights)
    }
}

/// Fixed weight table over binarized features. Weights are normalized to sum
/// to one so the score stays in [0, 1]; fields absent from the vector add 0.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    weights: Vec<(Field, f64)>,
    threshold: f64,
}

impl RuleClassifier {
    pub fn new(weights: Vec<(Field, f64)>, threshold: f64) -> Result<Self, LinkageError> {
        if weights.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(LinkageError::InvalidConfig(
                "rule weights must be finite and non-negative".to_string(),
            ));
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Err(LinkageError::InvalidConfig(
                "rule weights must not all be zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(LinkageError::InvalidConfig(format!(
                "rule threshold {} is outside [0, 1]",
                threshold
            )));
        }
        let weights = weights.into_iter().map(|(f, w)| (f, w / total)).collect();
        Ok(Self { weights, threshold })
    }

    pub fn uniform(fields: &[Field], threshold: f64) -> Result<Self, LinkageError> {
        Self::new(fields.iter().map(|f| (*f, 1.0)).collect(), threshold)
    }

    pub fn for_strategy(strategy: BlockingStrategy) -> Result<Self, LinkageError> {
        Self::new(strategy.rule_weights(), RULE_DEFAULT_THRESHOLD)
    }

    /// The configured table when one is set, otherwise the strategy baseline.
    pub fn configured(strategy: BlockingStrategy, weights: Option<&RuleWeights>) -> Result<Self, LinkageError> {
        match weights {
            Some(weights) => Self::new(weights.as_slice().to_vec(), RULE_DEFAULT_THRESHOLD),
            None => Self::for_strategy(strategy),
        }
    }

    pub fn weights(&self) -> &[(Field, f64)] {
        &self.weights
    }
}

impl Classifier for RuleClassifier {
    fn name(&self) -> &str {
        "rule"
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .map(|(field, weight)| weight * features.get(*field).map(|f| f.binarized()).unwrap_or(0.0))
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }

    fn default_threshold(&self) -> f64 {
        self.threshold
    }
}

/// Logistic scorer backed by a calibrated model.
#[derive(Debug, Clone)]
pub struct TrainedClassifier {
    model: Model,
}

impl TrainedClassifier {
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

impl Classifier for TrainedClassifier {
    fn name(&self) -> &str {
        "trained"
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        self.model.predict(features)
    }

    fn default_threshold(&self) -> f64 {
        self.model.threshold
    }
}

/// Resolves the configured classifier. A trained classifier without a model is
/// a configuration error, never a fallback to the rule table.
pub fn build_classifier(
    kind: ClassifierKind,
    strategy: BlockingStrategy,
    rule_weights: Option<&RuleWeights>,
    model: Option<Model>,
    model_path: &Path,
) -> Result<Arc<dyn Classifier>, LinkageError> {
    match kind {
        ClassifierKind::Rule => {
            let rule = RuleClassifier::configured(strategy, rule_weights)?;
            info!(
                "Using rule classifier for [{}] with weights {:?}",
                strategy,
                rule.weights()
            );
            Ok(Arc::new(rule))
        }
        ClassifierKind::Trained => {
            let model = model.ok_or_else(|| LinkageError::ModelRequired {
                strategy: strategy.id().to_string(),
                path: model_path.to_path_buf(),
            })?;
            if model.strategy != strategy {
                return Err(LinkageError::ModelStrategyMismatch {
                    path: model_path.to_path_buf(),
                    expected: strategy.id().to_string(),
                    found: model.strategy.id().to_string(),
                });
            }
            info!(
                "Using trained classifier for [{}] (threshold {:.4}, fingerprint {})",
                strategy, model.threshold, model.fingerprint
            );
            Ok(Arc::new(TrainedClassifier::new(model)))
        }
    }
}
