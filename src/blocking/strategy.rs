// src/blocking/strategy.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LinkageError;
use crate::matching::comparator::{ComparisonKind, ComparisonPlan, FieldComparison};
use crate::models::{Field, Record};

const MODEL_ACCEPTANCE: f64 = 0.85;
const YEAR_TOLERANCE: f64 = 1.0;
const YEAR_DECAY: f64 = 5.0;

/// Ordered, normalized attribute values two records must share to be compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey(pub Vec<String>);

impl BlockKey {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }
}

/// Named blocking configurations. Looser keys trade candidate volume for recall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockingStrategy {
    /// (make, year)
    MakeYear,
    /// (year, body_type)
    YearBody,
    /// (make, year, body_type)
    MakeYearBody,
}

impl BlockingStrategy {
    pub const ALL: [BlockingStrategy; 3] = [
        BlockingStrategy::MakeYear,
        BlockingStrategy::YearBody,
        BlockingStrategy::MakeYearBody,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            BlockingStrategy::MakeYear => "make_year",
            BlockingStrategy::YearBody => "year_body",
            BlockingStrategy::MakeYearBody => "make_year_body",
        }
    }

    pub fn key_fields(&self) -> &'static [Field] {
        match self {
            BlockingStrategy::MakeYear => &[Field::Make, Field::Year],
            BlockingStrategy::YearBody => &[Field::Year, Field::BodyType],
            BlockingStrategy::MakeYearBody => &[Field::Make, Field::Year, Field::BodyType],
        }
    }

    pub fn key(&self, record: &Record) -> Option<BlockKey> {
        block_key(record, self.key_fields())
    }

    /// The fixed feature-vector shape produced under this strategy.
    pub fn comparison_plan(&self) -> ComparisonPlan {
        let mut comparisons = vec![
            FieldComparison::new(Field::Make, ComparisonKind::Exact),
            FieldComparison::new(Field::Model, ComparisonKind::Text { acceptance: MODEL_ACCEPTANCE }),
            FieldComparison::new(Field::BrandModel, ComparisonKind::Text { acceptance: MODEL_ACCEPTANCE }),
            FieldComparison::new(
                Field::Year,
                ComparisonKind::Numeric {
                    tolerance: YEAR_TOLERANCE,
                    decay: YEAR_DECAY,
                },
            ),
        ];
        if matches!(self, BlockingStrategy::YearBody | BlockingStrategy::MakeYearBody) {
            comparisons.push(FieldComparison::new(Field::BodyType, ComparisonKind::Exact));
        }
        comparisons.push(FieldComparison::new(Field::FuelType, ComparisonKind::Exact));
        comparisons.push(FieldComparison::new(Field::Transmission, ComparisonKind::Exact));
        ComparisonPlan::new(comparisons)
    }

    /// Baseline rule table: the model must agree, fuel and transmission refine.
    pub fn rule_weights(&self) -> Vec<(Field, f64)> {
        vec![
            (Field::Model, 3.0),
            (Field::FuelType, 0.5),
            (Field::Transmission, 0.5),
        ]
    }
}

impl fmt::Display for BlockingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BlockingStrategy {
    type Err = LinkageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "make_year" | "b1" => Ok(BlockingStrategy::MakeYear),
            "year_body" | "b2" => Ok(BlockingStrategy::YearBody),
            "make_year_body" | "b3" => Ok(BlockingStrategy::MakeYearBody),
            _ => Err(LinkageError::UnknownBlockingStrategy(s.to_string())),
        }
    }
}

/// Projects `record` onto `fields`. Any missing component, or an empty field
/// list, yields `None` so the record is left out of blocking entirely.
pub fn block_key(record: &Record, fields: &[Field]) -> Option<BlockKey> {
    if fields.is_empty() {
        return None;
    }
    let mut components = Vec::with_capacity(fields.len());
    for field in fields {
        let raw = record.get(*field)?;
        let normalized = normalize_key_component(*field, &raw)?;
        components.push(normalized);
    }
    Some(BlockKey(components))
}

fn normalize_key_component(field: Field, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if field == Field::Year {
        // "2019.0" and "2019" must land in the same bucket
        if let Ok(year) = trimmed.parse::<f64>() {
            if year.is_finite() && year.fract() == 0.0 {
                return Some(format!("{}", year as i64));
            }
        }
    }
    Some(trimmed.to_lowercase())
}
