// src/rl/mod.rs
pub mod labeled;
pub mod model;
pub mod orchestrator;
pub mod trainer;

pub use labeled::{build_labeled_examples, derive_distinct_examples, featurize_examples, LabeledSet};
pub use model::{Model, MODEL_FORMAT_VERSION};
pub use orchestrator::{ModelOrchestrator, TrainingInputs};
pub use trainer::{calibrate_threshold, train, Calibration, LabeledVector, TrainerConfig};
