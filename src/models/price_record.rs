use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::NormalizedProduct;

/// A stored price observation. `(name, cost)` is unique across the table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceRecord {
    pub id: i64,
    pub name: String,
    pub cost: i64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewPriceRecord {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(range(min = 0, message = "cost must not be negative"))]
    pub cost: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
pub struct UpdatePriceRecord {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    #[validate(range(min = 0, message = "cost must not be negative"))]
    pub cost: Option<i64>,
}

impl PriceRecord {
    pub fn matches(&self, name: &str, cost: i64) -> bool {
        self.name == name && self.cost == cost
    }
}

impl From<NormalizedProduct> for NewPriceRecord {
    fn from(product: NormalizedProduct) -> Self {
        Self {
            name: product.name,
            cost: product.cost,
        }
    }
}

impl UpdatePriceRecord {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.cost.is_none()
    }
}
