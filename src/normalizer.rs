use regex::Regex;

use crate::models::{NormalizedProduct, RawProduct};
use crate::utils::error::{AppError, Result};

/// Turns rendered price text into an integer cost by concatenating its digits.
///
/// The catalog renders whole currency units with grouping spaces and a trailing
/// currency sign, so there is no decimal handling: `"1 234,00 ₽"` becomes `123400`.
#[derive(Debug, Clone)]
pub struct PriceNormalizer {
    non_digit: Regex,
}

impl PriceNormalizer {
    pub fn new() -> Self {
        Self {
            non_digit: Regex::new(r"[^0-9]+").expect("static pattern"),
        }
    }

    pub fn normalize(&self, raw: &str) -> Result<i64> {
        let digits = self.non_digit.replace_all(raw, "");
        if digits.is_empty() {
            return Err(AppError::Normalization { raw: raw.to_string() });
        }

        // Overflow is the only way a pure digit string fails to parse.
        digits.parse::<i64>().map_err(|_| AppError::Normalization { raw: raw.to_string() })
    }

    pub fn normalize_product(&self, product: &RawProduct) -> Result<NormalizedProduct> {
        let cost = self.normalize(product.price_text())?;
        Ok(NormalizedProduct::new(product.name.clone(), cost))
    }
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
