// src/matching/comparator.rs - Pairwise field similarity for candidate pairs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use strsim::jaro_winkler;

use crate::models::{CandidatePair, FeatureVector, Field, FieldSimilarity, Record, Similarity};

const DEFAULT_TEXT_CACHE_SIZE: usize = 10_000;

/// How a single field is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComparisonKind {
    /// Case-insensitive equality, 1.0 or 0.0.
    Exact,
    /// Jaro-Winkler similarity; `acceptance` travels with the feature for
    /// classifiers that binarize.
    Text { acceptance: f64 },
    /// Differences up to `tolerance` score 1.0, then fall linearly to 0.0
    /// over `decay` further units.
    Numeric { tolerance: f64, decay: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldComparison {
    pub field: Field,
    pub kind: ComparisonKind,
}

impl FieldComparison {
    pub fn new(field: Field, kind: ComparisonKind) -> Self {
        Self { field, kind }
    }
}

/// Ordered comparisons; fixes the shape of every feature vector produced with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPlan {
    comparisons: Vec<FieldComparison>,
}

impl ComparisonPlan {
    pub fn new(comparisons: Vec<FieldComparison>) -> Self {
        Self { comparisons }
    }

    pub fn comparisons(&self) -> &[FieldComparison] {
        &self.comparisons
    }

    pub fn fields(&self) -> Vec<Field> {
        self.comparisons.iter().map(|c| c.field).collect()
    }
}

/// Stateful only through its text-similarity cache; each worker owns one.
pub struct FeatureComparator {
    plan: ComparisonPlan,
    text_cache: LruCache<(String, String), f64>,
    cache_hits: usize,
    cache_misses: usize,
}

impl FeatureComparator {
    pub fn new(plan: ComparisonPlan) -> Self {
        Self::with_cache_size(plan, DEFAULT_TEXT_CACHE_SIZE)
    }

    pub fn with_cache_size(plan: ComparisonPlan, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            plan,
            text_cache: LruCache::new(capacity),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        (self.cache_hits, self.cache_misses)
    }

    /// Never fails: a field missing on either side becomes `Similarity::Missing`.
    pub fn compare(&mut self, pair: &CandidatePair, left: &Record, right: &Record) -> FeatureVector {
        let mut fields = Vec::with_capacity(self.plan.comparisons.len());
        for i in 0..self.plan.comparisons.len() {
            let comparison = self.plan.comparisons[i];
            let similarity = match (left.get(comparison.field), right.get(comparison.field)) {
                (Some(a), Some(b)) => self.compare_values(comparison.kind, &a, &b),
                _ => Similarity::Missing,
            };
            let acceptance = match comparison.kind {
                ComparisonKind::Text { acceptance } => Some(acceptance),
                _ => None,
            };
            fields.push(FieldSimilarity {
                field: comparison.field,
                similarity,
                acceptance,
            });
        }
        FeatureVector {
            pair: pair.clone(),
            fields,
        }
    }

    fn compare_values(&mut self, kind: ComparisonKind, a: &str, b: &str) -> Similarity {
        match kind {
            ComparisonKind::Exact => {
                let (a, b) = (normalize_text(a), normalize_text(b));
                if a.is_empty() || b.is_empty() {
                    Similarity::Missing
                } else if a == b {
                    Similarity::Score(1.0)
                } else {
                    Similarity::Score(0.0)
                }
            }
            ComparisonKind::Text { .. } => self.cached_text_similarity(a, b),
            ComparisonKind::Numeric { tolerance, decay } => numeric_proximity(a, b, tolerance, decay),
        }
    }

    fn cached_text_similarity(&mut self, a: &str, b: &str) -> Similarity {
        let (a, b) = (normalize_text(a), normalize_text(b));
        if a.is_empty() || b.is_empty() {
            return Similarity::Missing;
        }
        // jaro_winkler is symmetric, so order the key
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(score) = self.text_cache.get(&key) {
            self.cache_hits += 1;
            return Similarity::Score(*score);
        }
        self.cache_misses += 1;
        let score = jaro_winkler(&key.0, &key.1);
        self.text_cache.put(key, score);
        Similarity::Score(score)
    }
}

impl Drop for FeatureComparator {
    fn drop(&mut self) {
        if self.cache_hits + self.cache_misses > 0 {
            debug!(
                "Comparator text cache: {} hits, {} misses",
                self.cache_hits, self.cache_misses
            );
        }
    }
}

/// Case folding and whitespace collapsing only.
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn numeric_proximity(a: &str, b: &str, tolerance: f64, decay: f64) -> Similarity {
    let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) else {
        return Similarity::Missing;
    };
    if !x.is_finite() || !y.is_finite() {
        return Similarity::Missing;
    }
    let diff = (x - y).abs();
    if diff <= tolerance {
        return Similarity::Score(1.0);
    }
    if decay <= 0.0 {
        return Similarity::Score(0.0);
    }
    Similarity::Score((1.0 - (diff - tolerance) / decay).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::BlockingStrategy;
    use crate::models::Source;

    fn car(id: &str, source: Source, make: &str, model: &str, year: &str) -> Record {
        Record::new(id, source)
            .with(Field::Make, make)
            .with(Field::Model, model)
            .with(Field::Year, year)
    }

    #[test]
    fn identical_cars_score_one_on_shared_fields() {
        let left = car("1", Source::Left, "toyota", "corolla", "2019");
        let right = car("10", Source::Right, "Toyota", "Corolla", "2019.0");
        let mut comparator = FeatureComparator::new(BlockingStrategy::MakeYear.comparison_plan());
        let vector = comparator.compare(&CandidatePair::new("1", "10"), &left, &right);
        assert_eq!(vector.value(Field::Make), 1.0);
        assert_eq!(vector.value(Field::Model), 1.0);
        assert_eq!(vector.value(Field::Year), 1.0);
        assert!(vector.get(Field::FuelType).unwrap().similarity.is_missing());
        assert_eq!(vector.field_names(), BlockingStrategy::MakeYear.comparison_plan().fields());
    }

    #[test]
    fn text_score_is_raw_with_acceptance_attached() {
        let left = car("1", Source::Left, "ford", "focus", "2018");
        let right = car("2", Source::Right, "ford", "fiesta", "2018");
        let mut comparator = FeatureComparator::new(BlockingStrategy::MakeYear.comparison_plan());
        let vector = comparator.compare(&CandidatePair::new("1", "2"), &left, &right);
        let model = vector.get(Field::Model).unwrap();
        assert!(model.similarity.value() > 0.0 && model.similarity.value() < 0.85);
        assert_eq!(model.acceptance, Some(0.85));
        assert_eq!(model.binarized(), 0.0);
    }

    #[test]
    fn year_proximity_tolerates_one_year() {
        assert_eq!(numeric_proximity("2019", "2018", 1.0, 5.0), Similarity::Score(1.0));
        let decayed = numeric_proximity("2019", "2016", 1.0, 5.0).value();
        assert!((decayed - 0.6).abs() < 1e-9);
        assert_eq!(numeric_proximity("2019", "2005", 1.0, 5.0), Similarity::Score(0.0));
        assert_eq!(numeric_proximity("n/a", "2005", 1.0, 5.0), Similarity::Missing);
    }

    #[test]
    fn cache_serves_repeated_and_swapped_pairs() {
        let mut comparator = FeatureComparator::with_cache_size(
            ComparisonPlan::new(vec![FieldComparison::new(
                Field::Model,
                ComparisonKind::Text { acceptance: 0.85 },
            )]),
            4,
        );
        let a = Record::new("1", Source::Left).with(Field::Model, "golf");
        let b = Record::new("2", Source::Right).with(Field::Model, "polo");
        let first = comparator.compare(&CandidatePair::new("1", "2"), &a, &b);
        let second = comparator.compare(&CandidatePair::new("1", "2"), &b, &a);
        assert_eq!(first.fields, second.fields);
        assert_eq!(comparator.cache_stats(), (1, 1));
    }

    #[test]
    fn normalization_folds_case_and_spaces() {
        assert_eq!(normalize_text("  Land   Rover "), "land rover");
        let mut comparator = FeatureComparator::new(ComparisonPlan::new(vec![FieldComparison::new(
            Field::Model,
            ComparisonKind::Text { acceptance: 0.85 },
        )]));
        let a = Record::new("1", Source::Left).with(Field::Model, "A4 ");
        let b = Record::new("2", Source::Right).with(Field::Model, "a4");
        let fv = comparator.compare(&CandidatePair::new("1", "2"), &a, &b);
        assert_eq!(fv.fields[0].similarity, Similarity::Score(1.0));
    }
}
