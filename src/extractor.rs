use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::models::RawProduct;
use crate::utils::error::{AppError, Result};

/// Products found on one page plus the link to the following page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtract {
    pub products: Vec<RawProduct>,
    /// `href` of the next-page anchor, exactly as written in the markup.
    pub next_page: Option<String>,
    /// Tiles dropped because they had no name.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ProductExtractor {
    product: Selector,
    name: Selector,
    price: Selector,
    next_page: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Validation(format!("Invalid CSS selector '{}': {:?}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

impl ProductExtractor {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            product: parse_selector(&selectors.product)?,
            name: parse_selector(&selectors.name)?,
            price: parse_selector(&selectors.price)?,
            next_page: parse_selector(&selectors.next_page)?,
        })
    }

    pub fn extract(&self, markup: &str) -> PageExtract {
        let document = Html::parse_document(markup);
        let mut extract = PageExtract::default();

        for (index, container) in document.select(&self.product).enumerate() {
            match self.extract_product(container) {
                Ok(product) => extract.products.push(product),
                Err(e) => {
                    tracing::warn!(position = index, error = %e, "Skipping product tile");
                    extract.skipped += 1;
                }
            }
        }

        extract.next_page = document
            .select(&self.next_page)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string);

        extract
    }

    fn extract_product(&self, container: ElementRef<'_>) -> Result<RawProduct> {
        let name = container
            .select(&self.name)
            .next()
            .map(element_text)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::Extraction("product tile has no name".to_string()))?;

        let raw_price = container
            .select(&self.price)
            .next()
            .map(element_text)
            .filter(|price| !price.is_empty());

        Ok(RawProduct::new(name, raw_price))
    }
}
