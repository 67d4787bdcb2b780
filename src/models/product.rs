use serde::{Deserialize, Serialize};

/// One product tile as it appears on a catalog page, before any parsing of the price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawProduct {
    pub name: String,
    /// `None` when the tile carries no price block.
    pub raw_price: Option<String>,
}

/// A product whose price has been reduced to an integer cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedProduct {
    pub name: String,
    pub cost: i64,
}

impl RawProduct {
    /// Rendering of a missing price.
    pub const NO_PRICE: &'static str = "N/A";

    pub fn new(name: impl Into<String>, raw_price: Option<String>) -> Self {
        Self {
            name: name.into(),
            raw_price,
        }
    }

    pub fn priced(name: impl Into<String>, raw_price: impl Into<String>) -> Self {
        Self::new(name, Some(raw_price.into()))
    }

    pub fn price_text(&self) -> &str {
        self.raw_price.as_deref().unwrap_or(Self::NO_PRICE)
    }
}

impl NormalizedProduct {
    pub fn new(name: impl Into<String>, cost: i64) -> Self {
        Self {
            name: name.into(),
            cost,
        }
    }
}
