use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::database::PriceStore;
use crate::models::{ChangeEvent, NewPriceRecord, NormalizedProduct, PriceRecord, RawProduct};
use crate::normalizer::PriceNormalizer;
use crate::notification_hub::NotificationHub;
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Inserted(PriceRecord),
    AlreadyRecorded,
}

/// Counters for one reconciliation pass over a catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassSummary {
    pub seen: usize,
    pub inserted: usize,
    pub unchanged: usize,
    /// Records whose price could not be normalized.
    pub excluded: usize,
    /// Records whose storage call failed.
    pub failed: usize,
}

/// Records first sightings of `(name, cost)` pairs and announces them.
pub struct ReconciliationEngine {
    store: Arc<dyn PriceStore>,
    hub: Arc<NotificationHub>,
    normalizer: PriceNormalizer,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn PriceStore>, hub: Arc<NotificationHub>) -> Self {
        Self {
            store,
            hub,
            normalizer: PriceNormalizer::new(),
        }
    }

    pub async fn reconcile(&self, product: &NormalizedProduct) -> Result<ReconcileOutcome> {
        if self
            .store
            .find_observation(&product.name, product.cost)
            .await?
            .is_some()
        {
            return Ok(ReconcileOutcome::AlreadyRecorded);
        }

        let new_record = NewPriceRecord::from(product.clone());
        // The unique constraint settles races with concurrent writers: the loser gets `None`.
        let Some(record) = self.store.insert_if_absent(&new_record).await? else {
            return Ok(ReconcileOutcome::AlreadyRecorded);
        };

        tracing::info!(id = record.id, name = %record.name, cost = record.cost, "New price recorded");
        metrics::counter!("catalog_records_created_total").increment(1);

        self.hub.broadcast(&ChangeEvent::created(&record)).await;
        Ok(ReconcileOutcome::Inserted(record))
    }

    /// Reconciles a whole catalog snapshot in order. Per-record failures are logged and counted.
    pub async fn reconcile_catalog(&self, products: &[RawProduct]) -> PassSummary {
        let mut summary = PassSummary::default();

        for raw in products {
            summary.seen += 1;

            let product = match self.normalizer.normalize_product(raw) {
                Ok(product) => product,
                Err(e) => {
                    tracing::debug!(name = %raw.name, error = %e, "Excluding product from reconciliation");
                    metrics::counter!("catalog_records_excluded_total").increment(1);
                    summary.excluded += 1;
                    continue;
                }
            };

            match self.reconcile(&product).await {
                Ok(ReconcileOutcome::Inserted(_)) => summary.inserted += 1,
                Ok(ReconcileOutcome::AlreadyRecorded) => summary.unchanged += 1,
                Err(e) => {
                    tracing::error!(name = %product.name, cost = product.cost, error = %e, "Failed to reconcile product");
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}
