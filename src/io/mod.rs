// src/io/mod.rs
pub mod ground_truth;
pub mod pairs;
pub mod records;

pub use ground_truth::{
    load_ground_truth, load_optional_ground_truth, split_ground_truth, write_ground_truth, write_split,
    GroundTruthSplit,
};
pub use pairs::{load_pairs, load_scored_pairs, write_match_set, write_pairs, write_scored_pairs};
pub use records::{load_records, read_records};
