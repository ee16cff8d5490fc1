// src/external/mod.rs
pub mod pair_format;
pub mod predictions;

pub use pair_format::{export_candidates, export_labeled, serialize_pair, serialize_record, ExportStats, PairFormat};
pub use predictions::{align_predictions, predicted_matches, read_predictions, Prediction};
