// src/utils/run.rs
use chrono::{NaiveDateTime, Utc};
use log::info;
use uuid::Uuid;

/// Identifier and timestamp stamped on every run artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
}

impl RunContext {
    pub fn new() -> Self {
        let context = Self {
            run_id: Uuid::new_v4().to_string(),
            run_timestamp: Utc::now().naive_utc(),
        };
        info!("Run ID: {} ({})", context.run_id, context.run_timestamp);
        context
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
