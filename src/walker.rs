use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::extractor::ProductExtractor;
use crate::fetcher::PageFetcher;
use crate::models::RawProduct;
use crate::utils::error::Result;

/// Products of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub url: String,
    pub products: Vec<RawProduct>,
    pub skipped: usize,
    /// Resolved next-page link, if the page had one.
    pub next_url: Option<String>,
}

/// Everything collected during one walk of a category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalkReport {
    pub products: Vec<RawProduct>,
    pub pages_visited: Vec<String>,
    pub skipped: usize,
    /// Set when a page could not be fetched; earlier pages are still reported.
    pub aborted: Option<String>,
    /// True when the walk stopped at `max_pages` with an unvisited next page still pending.
    pub truncated: bool,
}

/// Follows next-page links from a category's first page to its last.
pub struct CatalogWalker {
    fetcher: Arc<dyn PageFetcher>,
    extractor: ProductExtractor,
    base_url: String,
    max_pages: usize,
}

struct WalkState {
    next_url: Option<String>,
    visited: HashSet<String>,
}

/// Absolute links are kept, protocol-relative ones take `base_url`'s scheme, anything else is
/// appended to `base_url`.
pub fn resolve_next_url(base_url: &str, href: &str) -> String {
    if url::Url::parse(href).is_ok() {
        return href.to_string();
    }
    if href.starts_with("//") {
        let scheme = url::Url::parse(base_url)
            .map(|base| base.scheme().to_string())
            .unwrap_or_else(|_| "https".to_string());
        return format!("{}:{}", scheme, href);
    }

    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

impl CatalogWalker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: ProductExtractor,
        base_url: impl Into<String>,
        max_pages: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            base_url: base_url.into(),
            max_pages,
        }
    }

    /// Lazily yields one item per fetched page.
    ///
    /// The stream ends after the last page, after a repeated URL, after `max_pages` pages, or
    /// right after yielding the first fetch error.
    pub fn pages(&self, start_url: &str) -> BoxStream<'_, Result<CatalogPage>> {
        let state = WalkState {
            next_url: Some(start_url.to_string()),
            visited: HashSet::new(),
        };

        stream::unfold(state, move |mut state| async move {
            let url = state.next_url.take()?;

            if state.visited.len() >= self.max_pages {
                tracing::warn!(url = %url, max_pages = self.max_pages, "Page limit reached, stopping walk");
                return None;
            }
            if !state.visited.insert(url.clone()) {
                tracing::warn!(url = %url, "Next-page link points to a visited page, stopping walk");
                return None;
            }

            let markup = match self.fetcher.fetch(&url).await {
                Ok(markup) => markup,
                Err(e) => {
                    metrics::counter!("catalog_fetch_failures_total").increment(1);
                    // `next_url` stays empty, so the stream ends after this item.
                    return Some((Err(e), state));
                }
            };
            metrics::counter!("catalog_pages_fetched_total").increment(1);

            let extract = self.extractor.extract(&markup);
            state.next_url = extract
                .next_page
                .as_deref()
                .map(|href| resolve_next_url(&self.base_url, href));

            tracing::debug!(
                url = %url,
                products = extract.products.len(),
                skipped = extract.skipped,
                next = ?state.next_url,
                "Extracted catalog page"
            );

            let page = CatalogPage {
                url,
                products: extract.products,
                skipped: extract.skipped,
                next_url: state.next_url.clone(),
            };
            Some((Ok(page), state))
        })
        .boxed()
    }

    /// Walks the whole category and collects every product in page order.
    pub async fn walk(&self, start_url: &str) -> WalkReport {
        let mut report = WalkReport::default();
        let mut pending = None;
        let mut pages = self.pages(start_url);

        while let Some(page) = pages.next().await {
            match page {
                Ok(page) => {
                    pending = page.next_url;
                    report.pages_visited.push(page.url);
                    report.skipped += page.skipped;
                    report.products.extend(page.products);
                }
                Err(e) => {
                    tracing::error!(error = %e, pages = report.pages_visited.len(), "Catalog walk aborted");
                    report.aborted = Some(e.to_string());
                }
            }
        }

        // A pending link that was never visited means the page cap cut the walk short.
        report.truncated = report.aborted.is_none()
            && pending.is_some_and(|next| !report.pages_visited.contains(&next));

        tracing::info!(
            pages = report.pages_visited.len(),
            products = report.products.len(),
            skipped = report.skipped,
            aborted = report.aborted.is_some(),
            truncated = report.truncated,
            "Catalog walk finished"
        );

        report
    }
}
