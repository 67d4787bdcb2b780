use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::PriceRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Message pushed to live subscribers whenever a price record changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub name: String,
    pub cost: i64,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, name: impl Into<String>, cost: i64) -> Self {
        Self {
            kind,
            name: name.into(),
            cost,
        }
    }

    pub fn created(record: &PriceRecord) -> Self {
        Self::new(ChangeKind::Created, record.name.clone(), record.cost)
    }

    pub fn updated(record: &PriceRecord) -> Self {
        Self::new(ChangeKind::Updated, record.name.clone(), record.cost)
    }

    pub fn deleted(record: &PriceRecord) -> Self {
        Self::new(ChangeKind::Deleted, record.name.clone(), record.cost)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        };
        f.write_str(label)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.kind, self.name, self.cost)
    }
}
