// src/utils/config.rs
use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::blocking::BlockingStrategy;
use crate::error::LinkageError;
use crate::io::ground_truth::TRAIN_FILE;
use crate::matching::{ClassifierKind, RuleWeights};
use crate::rl::Model;

pub const DEFAULT_TARGET_RECALL: f64 = 0.95;
pub const DEFAULT_BUCKET_CAP: usize = 2_000;
pub const DEFAULT_SAMPLE_CAP: usize = 50_000;
pub const DEFAULT_TRAINING_CAP: usize = 750;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq)]
pub struct PathsConfig {
    pub left: PathBuf,
    pub right: PathBuf,
    pub gt_dir: PathBuf,
    pub results_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            left: PathBuf::from("data/processed/left_records.csv"),
            right: PathBuf::from("data/processed/right_records.csv"),
            gt_dir: PathBuf::from("data/gt"),
            results_dir: PathBuf::from("data/results"),
            models_dir: PathBuf::from("data/models"),
        }
    }
}

/// Every recognized run option. Caps of `None` mean unlimited.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkageConfig {
    pub blocking_strategy: BlockingStrategy,
    pub classifier: ClassifierKind,
    /// `None` defers to the classifier's own cutoff.
    pub score_threshold: Option<f64>,
    /// `None` uses the blocking strategy's baseline table.
    pub rule_weights: Option<RuleWeights>,
    pub target_recall: f64,
    pub bucket_cap: Option<usize>,
    pub sample_cap: Option<usize>,
    pub training_cap: Option<usize>,
    pub seed: u64,
    pub workers: usize,
    pub retrain: bool,
    pub paths: PathsConfig,
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            blocking_strategy: BlockingStrategy::MakeYear,
            classifier: ClassifierKind::Rule,
            score_threshold: None,
            rule_weights: None,
            target_recall: DEFAULT_TARGET_RECALL,
            bucket_cap: Some(DEFAULT_BUCKET_CAP),
            sample_cap: Some(DEFAULT_SAMPLE_CAP),
            training_cap: Some(DEFAULT_TRAINING_CAP),
            seed: DEFAULT_SEED,
            workers: num_cpus::get(),
            retrain: false,
            paths: PathsConfig::default(),
        }
    }
}

impl LinkageConfig {
    /// Reads `LINKAGE_*` variables over the defaults. Values that are set but
    /// unparsable are configuration errors, not silently defaulted.
    pub fn from_env() -> Result<Self, LinkageError> {
        let defaults = Self::default();
        Ok(Self {
            blocking_strategy: match env_value("LINKAGE_BLOCKING_STRATEGY") {
                Some(raw) => raw.parse()?,
                None => defaults.blocking_strategy,
            },
            classifier: match env_value("LINKAGE_CLASSIFIER") {
                Some(raw) => raw.parse()?,
                None => defaults.classifier,
            },
            score_threshold: env_optional("LINKAGE_SCORE_THRESHOLD")?,
            rule_weights: match env_value("LINKAGE_RULE_WEIGHTS") {
                Some(raw) => Some(raw.parse()?),
                None => defaults.rule_weights,
            },
            target_recall: env_parse("LINKAGE_TARGET_RECALL", defaults.target_recall)?,
            bucket_cap: env_cap("LINKAGE_BUCKET_CAP", defaults.bucket_cap)?,
            sample_cap: env_cap("LINKAGE_SAMPLE_CAP", defaults.sample_cap)?,
            training_cap: env_cap("LINKAGE_TRAINING_CAP", defaults.training_cap)?,
            seed: env_parse("LINKAGE_SEED", defaults.seed)?,
            workers: env_parse("LINKAGE_WORKERS", defaults.workers)?,
            retrain: env_parse("LINKAGE_RETRAIN", defaults.retrain)?,
            paths: PathsConfig {
                left: env_path("LINKAGE_LEFT_PATH", defaults.paths.left),
                right: env_path("LINKAGE_RIGHT_PATH", defaults.paths.right),
                gt_dir: env_path("LINKAGE_GT_DIR", defaults.paths.gt_dir),
                results_dir: env_path("LINKAGE_RESULTS_DIR", defaults.paths.results_dir),
                models_dir: env_path("LINKAGE_MODELS_DIR", defaults.paths.models_dir),
            },
        })
    }

    pub fn model_path(&self) -> PathBuf {
        Model::path_for(&self.paths.models_dir, self.blocking_strategy)
    }

    pub fn train_truth_path(&self) -> PathBuf {
        self.paths.gt_dir.join(TRAIN_FILE)
    }

    /// Runs before any computation.
    pub fn validate(&self) -> Result<(), LinkageError> {
        if let Some(t) = self.score_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(LinkageError::InvalidConfig(format!(
                    "score threshold {} is outside [0, 1]",
                    t
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.target_recall) {
            return Err(LinkageError::InvalidConfig(format!(
                "target recall {} is outside [0, 1]",
                self.target_recall
            )));
        }
        if self.workers == 0 {
            return Err(LinkageError::InvalidConfig("worker count must be at least 1".to_string()));
        }
        if self.classifier == ClassifierKind::Trained {
            let model_path = self.model_path();
            let can_train = self.train_truth_path().exists();
            let has_model = model_path.exists();
            if (!has_model && !can_train) || (self.retrain && !can_train) {
                return Err(LinkageError::ModelRequired {
                    strategy: self.blocking_strategy.id().to_string(),
                    path: model_path,
                });
            }
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("⚙️  Linkage configuration:");
        info!("   • Blocking strategy: {}", self.blocking_strategy);
        info!("   • Classifier: {}", self.classifier);
        match self.score_threshold {
            Some(t) => info!("   • Score threshold: {:.4}", t),
            None => info!("   • Score threshold: classifier default"),
        }
        match &self.rule_weights {
            Some(weights) => info!("   • Rule weights: {}", weights),
            None => info!("   • Rule weights: {} baseline", self.blocking_strategy),
        }
        info!("   • Target recall: {:.2}", self.target_recall);
        info!(
            "   • Caps: bucket {:?}, sample {:?}, training {:?}",
            self.bucket_cap, self.sample_cap, self.training_cap
        );
        info!("   • Seed: {} | workers: {} | retrain: {}", self.seed, self.workers, self.retrain);
        info!(
            "   • Inputs: {} / {} | gt: {}",
            self.paths.left.display(),
            self.paths.right.display(),
            self.paths.gt_dir.display()
        );
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T, LinkageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| LinkageError::InvalidConfig(format!("{}='{}': {}", name, raw, e))),
        None => Ok(default),
    }
}

fn env_optional<T>(name: &str) -> Result<Option<T>, LinkageError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_value(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| LinkageError::InvalidConfig(format!("{}='{}': {}", name, raw, e))),
        None => Ok(None),
    }
}

/// 0 disables the cap.
fn env_cap(name: &str, default: Option<usize>) -> Result<Option<usize>, LinkageError> {
    Ok(match env_optional::<usize>(name)? {
        Some(0) => None,
        Some(cap) => Some(cap),
        None => default,
    })
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env_value(name).map(PathBuf::from).unwrap_or(default)
}

pub fn cap_from_arg(value: usize) -> Option<usize> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
