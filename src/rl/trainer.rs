// src/rl/trainer.rs - Logistic fit and recall-targeted threshold calibration
use chrono::Utc;
use log::{debug, info, warn};
use ndarray::{Array1, Array2};
use std::cmp::Ordering;

use crate::blocking::BlockingStrategy;
use crate::error::LinkageError;
use crate::models::{FeatureVector, Field, Label, LabeledExample};
use crate::rl::model::{fingerprint, sigmoid, Model, MODEL_FORMAT_VERSION};

/// Threshold used when calibration has nothing to work with.
const FALLBACK_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub target_recall: f64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 500,
            l2: 1e-3,
            target_recall: 0.95,
            seed: 42,
        }
    }
}

/// A labeled example together with its comparator output.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledVector {
    pub features: FeatureVector,
    pub label: Label,
}

impl LabeledVector {
    pub fn example(&self) -> LabeledExample {
        LabeledExample {
            pair: self.features.pair.clone(),
            label: self.label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub under_target: bool,
}

/// Fits weights on `training`, then picks the threshold on `holdout`
/// (or on `training` when no holdout is given).
pub fn train(
    strategy: BlockingStrategy,
    fields: &[Field],
    training: &[LabeledVector],
    holdout: Option<&[LabeledVector]>,
    config: &TrainerConfig,
) -> Result<Model, LinkageError> {
    if fields.is_empty() {
        return Err(LinkageError::InvalidTrainingSet("no feature fields to fit".to_string()));
    }
    let matches = training.iter().filter(|v| v.label.is_match()).count();
    let distinct = training.len() - matches;
    if matches == 0 || distinct == 0 {
        return Err(LinkageError::InvalidTrainingSet(format!(
            "need both classes, got {} match and {} distinct examples",
            matches, distinct
        )));
    }

    // Fit order must not depend on how the caller assembled the set
    let mut ordered: Vec<&LabeledVector> = training.iter().collect();
    ordered.sort_by(|a, b| a.example().cmp(&b.example()));

    info!(
        "Training [{}] on {} examples ({} match / {} distinct) over {} fields",
        strategy,
        ordered.len(),
        matches,
        distinct,
        fields.len()
    );
    let (weights, bias) = fit_logistic(&ordered, fields, config);

    let calibration_set: Vec<&LabeledVector> = match holdout {
        Some(h) if !h.is_empty() => h.iter().collect(),
        _ => {
            debug!("No holdout supplied, calibrating on the training set");
            ordered.clone()
        }
    };
    let scored: Vec<(f64, bool)> = calibration_set
        .iter()
        .map(|v| (logistic_score(&weights, bias, fields, &v.features), v.label.is_match()))
        .collect();
    let calibration = calibrate_threshold(&scored, config.target_recall);

    if calibration.under_target {
        warn!(
            "Model [{}] under target: best recall {:.4} < target {:.4} (threshold {:.4})",
            strategy, calibration.recall, config.target_recall, calibration.threshold
        );
    } else {
        info!(
            "Model [{}] calibrated: threshold {:.4}, precision {:.4}, recall {:.4}",
            strategy, calibration.threshold, calibration.precision, calibration.recall
        );
    }

    let mut examples: Vec<LabeledExample> = ordered.iter().map(|v| v.example()).collect();
    examples.dedup();

    Ok(Model {
        format_version: MODEL_FORMAT_VERSION,
        strategy,
        fields: fields.to_vec(),
        weights: weights.to_vec(),
        bias,
        threshold: calibration.threshold,
        target_recall: config.target_recall,
        achieved_precision: calibration.precision,
        achieved_recall: calibration.recall,
        under_target: calibration.under_target,
        seed: config.seed,
        fingerprint: fingerprint(&examples),
        examples,
        trained_at: Utc::now().naive_utc(),
    })
}

/// Class-balanced, L2-regularized logistic regression by full-batch
/// gradient descent from zero weights. Deterministic for a given order.
pub fn fit_logistic(examples: &[&LabeledVector], fields: &[Field], config: &TrainerConfig) -> (Array1<f64>, f64) {
    let n = examples.len();
    let d = fields.len();
    let mut x = Array2::<f64>::zeros((n, d));
    let mut y = Array1::<f64>::zeros(n);
    for (i, example) in examples.iter().enumerate() {
        for (j, field) in fields.iter().enumerate() {
            x[[i, j]] = example.features.value(*field);
        }
        y[i] = if example.label.is_match() { 1.0 } else { 0.0 };
    }

    let positives = y.sum();
    let negatives = n as f64 - positives;
    let sample_weights: Array1<f64> = y.mapv(|label| {
        if label > 0.5 {
            n as f64 / (2.0 * positives)
        } else {
            n as f64 / (2.0 * negatives)
        }
    });
    let weight_total = sample_weights.sum();

    let mut weights = Array1::<f64>::zeros(d);
    let mut bias = 0.0;
    for epoch in 0..config.epochs {
        let predictions = (x.dot(&weights) + bias).mapv(sigmoid);
        let errors = (&predictions - &y) * &sample_weights;
        let gradient = x.t().dot(&errors) / weight_total + &weights * config.l2;
        let bias_gradient = errors.sum() / weight_total;
        weights = weights - gradient * config.learning_rate;
        bias -= config.learning_rate * bias_gradient;

        if epoch % 100 == 0 {
            debug!("Epoch {}: bias {:.4}, |w| {:.4}", epoch, bias, weights.dot(&weights).sqrt());
        }
    }
    (weights, bias)
}

fn logistic_score(weights: &Array1<f64>, bias: f64, fields: &[Field], features: &FeatureVector) -> f64 {
    let logit: f64 = fields
        .iter()
        .zip(weights.iter())
        .map(|(field, w)| w * features.value(*field))
        .sum::<f64>()
        + bias;
    sigmoid(logit)
}

/// Sweeps every distinct score as a cutoff (`score >= t` predicts a match).
/// Among cutoffs reaching `target_recall` the most precise wins, ties going to
/// the lower cutoff. If none reaches it, the highest recall wins (then
/// precision, then lower cutoff) and the result is flagged under target.
pub fn calibrate_threshold(scored: &[(f64, bool)], target_recall: f64) -> Calibration {
    let total_positive = scored.iter().filter(|(_, m)| *m).count();
    if scored.is_empty() || total_positive == 0 {
        warn!("Calibration set has no positive examples; using threshold {}", FALLBACK_THRESHOLD);
        return Calibration {
            threshold: FALLBACK_THRESHOLD,
            precision: 0.0,
            recall: 0.0,
            under_target: true,
        };
    }

    let mut sorted: Vec<(f64, bool)> = scored.iter().copied().filter(|(s, _)| !s.is_nan()).collect();
    sorted.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut best_qualifying: Option<Calibration> = None;
    let mut best_fallback: Option<Calibration> = None;
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < sorted.len() {
        let threshold = sorted[i].0;
        while i < sorted.len() && sorted[i].0 == threshold {
            if sorted[i].1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let candidate = Calibration {
            threshold,
            precision: tp as f64 / (tp + fp) as f64,
            recall: tp as f64 / total_positive as f64,
            under_target: false,
        };
        // thresholds only decrease, so ">=" prefers the lower cutoff on ties
        if candidate.recall >= target_recall {
            if best_qualifying.map_or(true, |b| candidate.precision >= b.precision) {
                best_qualifying = Some(candidate);
            }
        } else if best_fallback.map_or(true, |b| {
            match candidate.recall.total_cmp(&b.recall) {
                Ordering::Greater => true,
                Ordering::Equal => candidate.precision >= b.precision,
                Ordering::Less => false,
            }
        }) {
            best_fallback = Some(candidate);
        }
    }

    match (best_qualifying, best_fallback) {
        (Some(best), _) => best,
        (None, Some(fallback)) => Calibration {
            under_target: true,
            ..fallback
        },
        (None, None) => Calibration {
            threshold: FALLBACK_THRESHOLD,
            precision: 0.0,
            recall: 0.0,
            under_target: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidatePair, FieldSimilarity, Similarity};

    fn labeled(l: &str, r: &str, model: f64, make: f64, label: Label) -> LabeledVector {
        LabeledVector {
            features: FeatureVector {
                pair: CandidatePair::new(l, r),
                fields: vec![
                    FieldSimilarity {
                        field: Field::Make,
                        similarity: Similarity::Score(make),
                        acceptance: None,
                    },
                    FieldSimilarity {
                        field: Field::Model,
                        similarity: Similarity::Score(model),
                        acceptance: Some(0.85),
                    },
                ],
            },
            label,
        }
    }

    fn separable() -> Vec<LabeledVector> {
        let mut set = Vec::new();
        for i in 0..10 {
            set.push(labeled(&format!("m{}", i), &format!("r{}", i), 0.95, 1.0, Label::Match));
            set.push(labeled(&format!("d{}", i), &format!("s{}", i), 0.3, 1.0, Label::Distinct));
        }
        set
    }

    #[test]
    fn learns_positive_weight_for_separating_field() {
        let model = train(
            BlockingStrategy::MakeYear,
            &[Field::Make, Field::Model],
            &separable(),
            None,
            &TrainerConfig::default(),
        )
        .unwrap();
        assert!(model.weight(Field::Model).unwrap() > 0.0);
        assert!(!model.under_target);
        assert_eq!(model.achieved_recall, 1.0);
        assert_eq!(model.achieved_precision, 1.0);
        let top_match = separable().into_iter().find(|v| v.label.is_match()).unwrap();
        assert!(model.predict(&top_match.features) >= model.threshold);
    }

    #[test]
    fn training_is_order_independent() {
        let forward = separable();
        let mut backward = separable();
        backward.reverse();
        let config = TrainerConfig::default();
        let a = train(BlockingStrategy::MakeYear, &[Field::Make, Field::Model], &forward, None, &config).unwrap();
        let b = train(BlockingStrategy::MakeYear, &[Field::Make, Field::Model], &backward, None, &config).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
        assert_eq!(a.threshold, b.threshold);
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn single_class_is_rejected() {
        let only_matches: Vec<_> = separable().into_iter().filter(|v| v.label.is_match()).collect();
        let result = train(
            BlockingStrategy::MakeYear,
            &[Field::Model],
            &only_matches,
            None,
            &TrainerConfig::default(),
        );
        assert!(matches!(result, Err(LinkageError::InvalidTrainingSet(_))));
    }

    #[test]
    fn calibration_prefers_precision_among_qualifying_cutoffs() {
        let scored = vec![(0.9, true), (0.8, true), (0.7, false), (0.6, true), (0.2, false)];
        let strict = calibrate_threshold(&scored, 0.6);
        assert_eq!(strict.threshold, 0.8);
        assert_eq!(strict.precision, 1.0);
        assert!(!strict.under_target);

        let full = calibrate_threshold(&scored, 1.0);
        assert_eq!(full.threshold, 0.6);
        assert_eq!(full.recall, 1.0);
        assert!((full.precision - 0.75).abs() < 1e-12);
    }

    #[test]
    fn unreachable_target_is_flagged() {
        let calibration = calibrate_threshold(&[(0.9, true), (0.4, false)], 1.5);
        assert!(calibration.under_target);
        assert_eq!(calibration.recall, 1.0);
        assert_eq!(calibration.threshold, 0.9);

        let empty = calibrate_threshold(&[(0.3, false)], 0.95);
        assert!(empty.under_target);
        assert_eq!(empty.threshold, FALLBACK_THRESHOLD);
    }
}
