// src/evaluation/evaluator.rs
use std::collections::HashSet;

use crate::models::{CandidatePair, EvaluationReport, GroundTruthEntry, RecordId};

/// Left and right ids a report is allowed to judge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationScope {
    left: HashSet<RecordId>,
    right: HashSet<RecordId>,
}

impl EvaluationScope {
    pub fn new(left: HashSet<RecordId>, right: HashSet<RecordId>) -> Self {
        Self { left, right }
    }

    /// Every id named by a ground-truth split, whatever its label.
    pub fn from_ground_truth(ground_truth: &[GroundTruthEntry]) -> Self {
        Self {
            left: ground_truth.iter().map(|e| e.left_id.clone()).collect(),
            right: ground_truth.iter().map(|e| e.right_id.clone()).collect(),
        }
    }

    pub fn contains(&self, pair: &CandidatePair) -> bool {
        self.left.contains(&pair.left_id) && self.right.contains(&pair.right_id)
    }

    pub fn left_ids(&self) -> &HashSet<RecordId> {
        &self.left
    }

    pub fn right_ids(&self) -> &HashSet<RecordId> {
        &self.right
    }
}

/// Scores a set of found pairs against ground truth inside `scope`.
///
/// Found pairs outside the scope are ignored. FP counts every in-scope found
/// pair that is not a labeled positive, whether or not it is listed as a
/// negative. Duplicate found pairs count once.
pub fn evaluate<'a, I>(label: &str, found: I, ground_truth: &[GroundTruthEntry], scope: &EvaluationScope) -> EvaluationReport
where
    I: IntoIterator<Item = &'a CandidatePair>,
{
    let positives: HashSet<CandidatePair> = ground_truth
        .iter()
        .filter(|e| e.is_positive())
        .map(|e| e.pair())
        .collect();
    let in_scope: HashSet<&CandidatePair> = found.into_iter().filter(|p| scope.contains(p)).collect();

    let found_count = in_scope.len();
    let tp = in_scope.iter().filter(|p| positives.contains(**p)).count();
    let fp = found_count - tp;

    let precision = if found_count > 0 { tp as f64 / found_count as f64 } else { 0.0 };
    let recall = if positives.is_empty() { 0.0 } else { tp as f64 / positives.len() as f64 };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    EvaluationReport {
        label: label.to_string(),
        tp,
        fp,
        found: found_count,
        precision,
        recall,
        f1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt() -> Vec<GroundTruthEntry> {
        vec![
            GroundTruthEntry::new("1", "10", 1),
            GroundTruthEntry::new("2", "11", 1),
            GroundTruthEntry::new("3", "12", 0),
        ]
    }

    #[test]
    fn perfect_found_set_scores_one() {
        let truth = gt();
        let scope = EvaluationScope::from_ground_truth(&truth);
        let found = vec![CandidatePair::new("1", "10"), CandidatePair::new("2", "11")];
        let report = evaluate("perfect", &found, &truth, &scope);
        assert_eq!((report.tp, report.fp, report.found), (2, 0, 2));
        assert_eq!((report.precision, report.recall, report.f1), (1.0, 1.0, 1.0));
    }

    #[test]
    fn unlabeled_in_scope_pairs_are_false_positives() {
        let truth = gt();
        let scope = EvaluationScope::from_ground_truth(&truth);
        let found = vec![
            CandidatePair::new("1", "10"),
            CandidatePair::new("2", "12"),
            CandidatePair::new("9", "10"),
        ];
        let report = evaluate("mixed", &found, &truth, &scope);
        assert_eq!(report.found, 2);
        assert_eq!(report.tp, 1);
        assert_eq!(report.fp, 1);
        assert_eq!(report.precision, 0.5);
        assert_eq!(report.recall, 0.5);
    }

    #[test]
    fn empty_inputs_do_not_divide_by_zero() {
        let truth = gt();
        let scope = EvaluationScope::from_ground_truth(&truth);
        let report = evaluate("empty", &Vec::new(), &truth, &scope);
        assert_eq!((report.precision, report.recall, report.f1), (0.0, 0.0, 0.0));

        let negatives = vec![GroundTruthEntry::new("3", "12", 0)];
        let found = vec![CandidatePair::new("3", "12")];
        let report = evaluate("no-positives", &found, &negatives, &EvaluationScope::from_ground_truth(&negatives));
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.fp, 1);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let truth = gt();
        let scope = EvaluationScope::from_ground_truth(&truth);
        let found = vec![CandidatePair::new("2", "11"), CandidatePair::new("1", "12")];
        assert_eq!(
            evaluate("a", &found, &truth, &scope),
            evaluate("a", &found, &truth, &scope)
        );
    }
}
