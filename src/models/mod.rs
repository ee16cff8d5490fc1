pub mod core;
pub mod matching;
pub mod stats_models;

pub use self::core::{Field, Record, RecordId, RecordTable, Source};
pub use self::matching::{
    CandidatePair, FeatureVector, FieldSimilarity, GroundTruthEntry, Label, LabeledExample,
    MatchSet, ScoredPair, Similarity,
};
pub use self::stats_models::{EvaluationReport, RunSummary};
