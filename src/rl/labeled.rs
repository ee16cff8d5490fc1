// src/rl/labeled.rs - Labeled example assembly from ground truth
use log::{info, warn};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::blocking::{derive_seed, seeded_sample};
use crate::matching::comparator::{ComparisonPlan, FeatureComparator};
use crate::models::{CandidatePair, GroundTruthEntry, Label, LabeledExample, RecordId, RecordTable};
use crate::rl::trainer::LabeledVector;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledSet {
    /// Sorted, unique.
    pub examples: Vec<LabeledExample>,
    pub skipped_unknown: usize,
    pub derived_distinct: usize,
}

impl LabeledSet {
    pub fn count(&self, label: Label) -> usize {
        self.examples.iter().filter(|e| e.label == label).count()
    }
}

/// Ground-truth rows become examples; rows naming an id missing from either
/// table are skipped. Blocked candidates that contradict a known positive are
/// added as distinct examples. Each class is then sampled down to `cap`.
pub fn build_labeled_examples(
    ground_truth: &[GroundTruthEntry],
    left: &RecordTable,
    right: &RecordTable,
    candidates: &[CandidatePair],
    cap: Option<usize>,
    seed: u64,
    site: &str,
) -> LabeledSet {
    let mut skipped_unknown = 0usize;
    let mut explicit: BTreeSet<LabeledExample> = BTreeSet::new();
    for entry in ground_truth {
        if !left.contains(&entry.left_id) || !right.contains(&entry.right_id) {
            skipped_unknown += 1;
            continue;
        }
        explicit.insert(LabeledExample {
            pair: entry.pair(),
            label: Label::from_flag(entry.label),
        });
    }
    if skipped_unknown > 0 {
        warn!(
            "Labeled examples [{}]: skipped {} ground-truth rows with ids not in the loaded records",
            site, skipped_unknown
        );
    }

    let labeled_pairs: HashSet<&CandidatePair> = explicit.iter().map(|e| &e.pair).collect();
    let derived: Vec<LabeledExample> = derive_distinct_examples(&explicit, candidates)
        .into_iter()
        .filter(|e| !labeled_pairs.contains(&e.pair))
        .collect();

    let (matches, explicit_distinct): (Vec<LabeledExample>, Vec<LabeledExample>) =
        explicit.iter().cloned().partition(|e| e.label.is_match());

    let matches = cap_class(&matches, cap, seed, &[site, "match"]);
    let mut distinct = cap_class(&explicit_distinct, cap, seed, &[site, "distinct"]);
    let room = cap.map_or(derived.len(), |c| c.saturating_sub(distinct.len()));
    let derived_kept = cap_class(&derived, Some(room), seed, &[site, "derived"]);
    let derived_distinct = derived_kept.len();
    distinct.extend(derived_kept);

    let mut examples: Vec<LabeledExample> = matches.into_iter().chain(distinct).collect();
    examples.sort();
    examples.dedup();

    let set = LabeledSet {
        examples,
        skipped_unknown,
        derived_distinct,
    };
    info!(
        "Labeled examples [{}]: {} match, {} distinct ({} derived from blocked candidates)",
        site,
        set.count(Label::Match),
        set.count(Label::Distinct),
        set.derived_distinct
    );
    set
}

/// A vehicle appears at most once per source, so a candidate sharing exactly
/// one endpoint with a known positive is a known distinct.
pub fn derive_distinct_examples(
    labeled: &BTreeSet<LabeledExample>,
    candidates: &[CandidatePair],
) -> Vec<LabeledExample> {
    let mut left_positive: HashMap<&RecordId, HashSet<&RecordId>> = HashMap::new();
    let mut right_positive: HashMap<&RecordId, HashSet<&RecordId>> = HashMap::new();
    for example in labeled.iter().filter(|e| e.label.is_match()) {
        left_positive
            .entry(&example.pair.left_id)
            .or_default()
            .insert(&example.pair.right_id);
        right_positive
            .entry(&example.pair.right_id)
            .or_default()
            .insert(&example.pair.left_id);
    }

    let mut derived = BTreeSet::new();
    for pair in candidates {
        let contradicts_left = left_positive
            .get(&pair.left_id)
            .map_or(false, |rights| !rights.contains(&pair.right_id));
        let contradicts_right = right_positive
            .get(&pair.right_id)
            .map_or(false, |lefts| !lefts.contains(&pair.left_id));
        if contradicts_left || contradicts_right {
            derived.insert(LabeledExample {
                pair: pair.clone(),
                label: Label::Distinct,
            });
        }
    }
    derived.into_iter().collect()
}

fn cap_class(examples: &[LabeledExample], cap: Option<usize>, seed: u64, site: &[&str]) -> Vec<LabeledExample> {
    match cap {
        Some(cap) if examples.len() > cap => seeded_sample(examples, cap, derive_seed(seed, site)),
        _ => examples.to_vec(),
    }
}

/// Compares every example's records. Examples whose records are gone are dropped.
pub fn featurize_examples(
    examples: &[LabeledExample],
    left: &RecordTable,
    right: &RecordTable,
    plan: &ComparisonPlan,
) -> Vec<LabeledVector> {
    let mut comparator = FeatureComparator::new(plan.clone());
    examples
        .iter()
        .filter_map(|example| {
            let l = left.get(&example.pair.left_id)?;
            let r = right.get(&example.pair.right_id)?;
            Some(LabeledVector {
                features: comparator.compare(&example.pair, l, r),
                label: example.label,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Field, Record, Source};

    fn table(source: Source, ids: &[&str]) -> RecordTable {
        RecordTable::new(
            source,
            ids.iter()
                .map(|id| Record::new(*id, source).with(Field::Make, "audi"))
                .collect(),
        )
    }

    #[test]
    fn derives_distincts_from_positive_only_truth() {
        let left = table(Source::Left, &["1", "2"]);
        let right = table(Source::Right, &["10", "11", "12"]);
        let gt = vec![GroundTruthEntry::new("1", "10", 1), GroundTruthEntry::new("2", "11", 1)];
        let candidates = vec![
            CandidatePair::new("1", "10"),
            CandidatePair::new("1", "12"),
            CandidatePair::new("2", "10"),
            CandidatePair::new("2", "11"),
        ];
        let set = build_labeled_examples(&gt, &left, &right, &candidates, None, 42, "train");
        assert_eq!(set.count(Label::Match), 2);
        assert_eq!(set.count(Label::Distinct), 2);
        assert!(set.examples.contains(&LabeledExample {
            pair: CandidatePair::new("1", "12"),
            label: Label::Distinct,
        }));
        assert!(set.examples.contains(&LabeledExample {
            pair: CandidatePair::new("2", "10"),
            label: Label::Distinct,
        }));
    }

    #[test]
    fn unknown_ids_are_skipped_and_counted() {
        let left = table(Source::Left, &["1"]);
        let right = table(Source::Right, &["10"]);
        let gt = vec![GroundTruthEntry::new("1", "10", 1), GroundTruthEntry::new("9", "10", 0)];
        let set = build_labeled_examples(&gt, &left, &right, &[], None, 42, "train");
        assert_eq!(set.skipped_unknown, 1);
        assert_eq!(set.examples.len(), 1);
    }

    #[test]
    fn per_class_cap_is_seeded() {
        let ids: Vec<String> = (0..30).map(|i| format!("{:02}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
        let left = table(Source::Left, &id_refs);
        let right = table(Source::Right, &id_refs);
        let gt: Vec<_> = ids
            .iter()
            .map(|id| GroundTruthEntry::new(id.as_str(), id.as_str(), 1))
            .collect();
        let a = build_labeled_examples(&gt, &left, &right, &[], Some(5), 7, "train");
        let b = build_labeled_examples(&gt, &left, &right, &[], Some(5), 7, "train");
        assert_eq!(a.count(Label::Match), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn featurize_follows_plan() {
        let left = table(Source::Left, &["1"]);
        let right = table(Source::Right, &["10"]);
        let plan = crate::blocking::BlockingStrategy::MakeYear.comparison_plan();
        let vectors = featurize_examples(
            &[LabeledExample {
                pair: CandidatePair::new("1", "10"),
                label: Label::Match,
            }],
            &left,
            &right,
            &plan,
        );
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].features.value(Field::Make), 1.0);
    }
}
