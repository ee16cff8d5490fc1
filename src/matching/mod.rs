// src/matching/mod.rs
pub mod classifier;
pub mod comparator;
pub mod manager;
pub mod resolver;

pub use classifier::{build_classifier, Classifier, ClassifierKind, RuleClassifier, RuleWeights, TrainedClassifier};
pub use comparator::{ComparisonKind, ComparisonPlan, FeatureComparator, FieldComparison};
pub use manager::{featurize_pairs, score_candidates};
pub use resolver::{filter_above, resolve};
