use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ScraperConfig;
use crate::database::PriceStore;
use crate::extractor::ProductExtractor;
use crate::fetcher::PageFetcher;
use crate::notification_hub::NotificationHub;
use crate::reconciler::{PassSummary, ReconciliationEngine};
use crate::utils::error::Result;
use crate::walker::CatalogWalker;

/// Outcome of one walk + reconcile pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pages_visited: usize,
    pub products_found: usize,
    pub skipped_tiles: usize,
    pub aborted: Option<String>,
    /// The walk hit the page cap before the catalog's last page.
    pub truncated: bool,
    pub summary: PassSummary,
}

/// Walks the configured category and reconciles what it finds.
pub struct CatalogPipeline {
    walker: CatalogWalker,
    engine: ReconciliationEngine,
    start_url: String,
}

impl CatalogPipeline {
    pub fn new(walker: CatalogWalker, engine: ReconciliationEngine, start_url: impl Into<String>) -> Self {
        Self {
            walker,
            engine,
            start_url: start_url.into(),
        }
    }

    /// Wires fetcher, extractor, store and hub together from scraper settings.
    pub fn from_config(
        config: &ScraperConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn PriceStore>,
        hub: Arc<NotificationHub>,
    ) -> Result<Self> {
        let extractor = ProductExtractor::new(&config.selectors)?;
        let walker = CatalogWalker::new(fetcher, extractor, config.base_url.clone(), config.max_pages);
        let engine = ReconciliationEngine::new(store, hub);
        Ok(Self::new(walker, engine, config.start_url.clone()))
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    /// Runs one pass. A fetch failure only shortens the walk; whatever was collected is reconciled.
    pub async fn run_pass(&self) -> PassReport {
        let started_at = Utc::now();
        tracing::info!(start_url = %self.start_url, "Starting catalog pass");

        let walk = self.walker.walk(&self.start_url).await;
        let summary = self.engine.reconcile_catalog(&walk.products).await;

        let report = PassReport {
            started_at,
            finished_at: Utc::now(),
            pages_visited: walk.pages_visited.len(),
            products_found: walk.products.len(),
            skipped_tiles: walk.skipped,
            aborted: walk.aborted,
            truncated: walk.truncated,
            summary,
        };

        tracing::info!(
            pages = report.pages_visited,
            truncated = report.truncated,
            inserted = report.summary.inserted,
            unchanged = report.summary.unchanged,
            excluded = report.summary.excluded,
            failed = report.summary.failed,
            "Catalog pass finished"
        );

        report
    }
}
