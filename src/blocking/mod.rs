// src/blocking/mod.rs
pub mod indexer;
pub mod sampling;
pub mod strategy;

pub use indexer::{block, block_with_strategy, BlockingLimits, BlockingOutput, BlockingStats};
pub use sampling::{derive_seed, sample_records, seeded_sample};
pub use strategy::{block_key, BlockKey, BlockingStrategy};
