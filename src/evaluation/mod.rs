// src/evaluation/mod.rs
pub mod evaluator;
pub mod report;

pub use evaluator::{evaluate, EvaluationScope};
pub use report::{log_report_table, sort_by_f1, write_report, REPORT_FILE_NAME};
