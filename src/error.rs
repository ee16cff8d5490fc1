// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors the linkage core raises instead of degrading silently.
///
/// Everything that is recoverable (missing field values, truncated external
/// output, capped buckets, under-target recall) is logged and counted by the
/// component that sees it; these variants are reserved for conditions that
/// must abort a run before or during computation.
#[derive(Debug, Error)]
pub enum LinkageError {
    #[error("required input '{resource}' not found at {}", path.display())]
    MissingInput { resource: String, path: PathBuf },

    #[error("unknown blocking strategy '{0}' (expected one of: make_year, year_body, make_year_body)")]
    UnknownBlockingStrategy(String),

    #[error("unknown classifier '{0}' (expected 'rule' or 'trained')")]
    UnknownClassifier(String),

    #[error("trained classifier requested for strategy '{strategy}' but no calibrated model is available at {}", path.display())]
    ModelRequired { strategy: String, path: PathBuf },

    #[error("model at {} was calibrated for strategy '{found}', but '{expected}' is configured", path.display())]
    ModelStrategyMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("unsupported model format version {found} (expected {expected})")]
    ModelVersion { found: u32, expected: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot train: {0}")]
    InvalidTrainingSet(String),

    #[error("{origin}, row {row}: {reason}")]
    MalformedInput {
        origin: String,
        row: usize,
        reason: String,
    },
}
