// src/models/core.rs
use log::warn;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Canonical vehicle attributes shared by both sources after schema alignment.
///
/// `BrandModel` is derived (`make` + `model`) and never read from input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Make,
    Model,
    Year,
    Mileage,
    Price,
    FuelType,
    Transmission,
    BodyType,
    BrandModel,
}

impl Field {
    /// Attributes that can appear as input columns.
    pub const ATTRIBUTES: [Field; 8] = [
        Field::Make,
        Field::Model,
        Field::Year,
        Field::Mileage,
        Field::Price,
        Field::FuelType,
        Field::Transmission,
        Field::BodyType,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Make => "make",
            Field::Model => "model",
            Field::Year => "year",
            Field::Mileage => "mileage",
            Field::Price => "price",
            Field::FuelType => "fuel_type",
            Field::Transmission => "transmission",
            Field::BodyType => "body_type",
            Field::BrandModel => "brand_model",
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, Field::BrandModel)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "make" => Ok(Field::Make),
            "model" => Ok(Field::Model),
            "year" => Ok(Field::Year),
            "mileage" => Ok(Field::Mileage),
            "price" => Ok(Field::Price),
            "fuel_type" | "fuel" => Ok(Field::FuelType),
            "transmission" => Ok(Field::Transmission),
            "body_type" => Ok(Field::BodyType),
            "brand_model" => Ok(Field::BrandModel),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}

/// Which of the two independently sourced tables a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Left => "L",
            Source::Right => "R",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// A single listing. Attribute values are either present and non-empty or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub source: Source,
    attributes: HashMap<Field, String>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, source: Source) -> Self {
        Self {
            id: id.into(),
            source,
            attributes: HashMap::new(),
        }
    }

    /// Builder-style setter, mostly for fixtures.
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Stores a value; blank strings count as absent. Derived fields are ignored.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        if field.is_derived() {
            return;
        }
        match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(v) => {
                self.attributes.insert(field, v);
            }
            None => {
                self.attributes.remove(&field);
            }
        }
    }

    pub fn get(&self, field: Field) -> Option<Cow<'_, str>> {
        match field {
            Field::BrandModel => {
                let make = self.attributes.get(&Field::Make);
                let model = self.attributes.get(&Field::Model);
                match (make, model) {
                    (Some(make), Some(model)) => Some(Cow::Owned(format!("{} {}", make, model))),
                    (Some(only), None) | (None, Some(only)) => Some(Cow::Borrowed(only.as_str())),
                    (None, None) => None,
                }
            }
            _ => self.attributes.get(&field).map(|v| Cow::Borrowed(v.as_str())),
        }
    }
}

/// Records of one source, indexed by id.
#[derive(Debug, Clone)]
pub struct RecordTable {
    pub source: Source,
    records: Vec<Record>,
    index: HashMap<RecordId, usize>,
}

impl RecordTable {
    /// Builds the table; a repeated id keeps its first occurrence.
    pub fn new(source: Source, records: Vec<Record>) -> Self {
        let mut kept = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());
        let mut duplicates = 0usize;

        for record in records {
            if index.contains_key(&record.id) {
                duplicates += 1;
                continue;
            }
            index.insert(record.id.clone(), kept.len());
            kept.push(record);
        }

        if duplicates > 0 {
            warn!(
                "Source {}: dropped {} records with duplicate ids (first occurrence kept)",
                source.as_str(),
                duplicates
            );
        }

        Self {
            source,
            records: kept,
            index,
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
