//! Reconciliation engine
//!
//! Decides, for each crawled candidate, whether to create a new catalog
//! record, update the existing one, or skip it. Manual exclusion always
//! wins over any other rule, and the per-field update toggles gate exactly
//! which attributes a sync run may overwrite. On the update path the
//! record's existing margin is preserved as the pricing rule, so a manual
//! reprice survives subsequent syncs.

use chrono::Utc;
use tracing::debug;

use crate::domain::error::{SyncError, SyncResult};
use crate::domain::pricing;
use crate::domain::product::{CandidateProduct, CatalogRecord, StockInfo};
use crate::domain::settings::SyncSettings;
use crate::infrastructure::catalog_repository::CatalogRepository;

/// Outcome of reconciling one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created,
    Updated,
    Skipped,
}

pub struct ReconciliationEngine {
    catalog: CatalogRepository,
}

impl ReconciliationEngine {
    pub fn new(catalog: CatalogRepository) -> Self {
        Self { catalog }
    }

    pub async fn reconcile(
        &self,
        candidate: &CandidateProduct,
        settings: &SyncSettings,
    ) -> SyncResult<ReconcileOutcome> {
        // A lookup failure means the store itself is unhealthy and stays
        // fatal; only the per-item write is downgraded below.
        match self.catalog.find_by_sku(&candidate.sku).await? {
            None => self.create(candidate, settings).await,
            Some(existing) => self.update(candidate, existing, settings).await,
        }
    }

    async fn create(
        &self,
        candidate: &CandidateProduct,
        settings: &SyncSettings,
    ) -> SyncResult<ReconcileOutcome> {
        let retail = pricing::retail_price(candidate.wholesale_price, settings.default_margin_percent);
        if !pricing::is_eligible(candidate, retail, settings) {
            debug!(sku = candidate.sku.as_str(), "candidate ineligible, skipped");
            return Ok(ReconcileOutcome::Skipped);
        }

        let retail = pricing::round_currency(retail);
        let stock = candidate.stock.clone().unwrap_or_default();
        let record = CatalogRecord {
            sku: candidate.sku.clone(),
            name: candidate.name.clone(),
            brand: candidate.brand.clone(),
            category: candidate.category.clone(),
            wholesale_price: candidate.wholesale_price,
            retail_price: retail,
            margin_percent: pricing::margin_percent(candidate.wholesale_price, retail),
            description: candidate.description.clone(),
            images: candidate.images.clone(),
            in_stock: stock.in_stock,
            stock_quantity: stock.quantity,
            flavours: None,
            strengths: None,
            ingredients: None,
            allergens: None,
            active: true,
            excluded: false,
            source_url: candidate.source_url.clone(),
            last_synced_at: Utc::now(),
        };

        self.catalog
            .insert(&record)
            .await
            .map_err(|e| SyncError::reconciliation(&candidate.sku, e.to_string()))?;
        Ok(ReconcileOutcome::Created)
    }

    async fn update(
        &self,
        candidate: &CandidateProduct,
        existing: CatalogRecord,
        settings: &SyncSettings,
    ) -> SyncResult<ReconcileOutcome> {
        if existing.excluded {
            debug!(sku = existing.sku.as_str(), "record excluded, skipped");
            return Ok(ReconcileOutcome::Skipped);
        }

        let mut record = existing;
        record.name = candidate.name.clone();
        if !candidate.brand.is_empty() {
            record.brand = candidate.brand.clone();
        }
        if !candidate.category.is_empty() {
            record.category = candidate.category.clone();
        }

        if settings.update_prices {
            record.wholesale_price = candidate.wholesale_price;
            record.retail_price = pricing::round_currency(pricing::retail_price(
                candidate.wholesale_price,
                record.margin_percent,
            ));
            record.margin_percent =
                pricing::margin_percent(record.wholesale_price, record.retail_price);
        }

        if settings.update_stock {
            if let Some(stock) = &candidate.stock {
                record.in_stock = stock.in_stock;
                record.stock_quantity = stock.quantity;
            }
        }

        if settings.update_descriptions {
            if candidate.description.is_some() {
                record.description = candidate.description.clone();
            }
            if !candidate.images.is_empty() {
                record.images = candidate.images.clone();
            }
        }

        record.source_url = candidate.source_url.clone();
        record.last_synced_at = Utc::now();

        self.catalog
            .update(&record)
            .await
            .map_err(|e| SyncError::reconciliation(&candidate.sku, e.to_string()))?;
        Ok(ReconcileOutcome::Updated)
    }

    /// Apply a stock-check result to a known record. Honors the
    /// `update_stock` toggle like every other write path, and skips
    /// records whose stock state did not change.
    pub async fn apply_stock(
        &self,
        record: &CatalogRecord,
        stock: &StockInfo,
        settings: &SyncSettings,
    ) -> SyncResult<ReconcileOutcome> {
        if record.excluded || !settings.update_stock {
            return Ok(ReconcileOutcome::Skipped);
        }
        if record.in_stock == stock.in_stock && record.stock_quantity == stock.quantity {
            return Ok(ReconcileOutcome::Skipped);
        }

        self.catalog
            .update_stock(&record.sku, stock.in_stock, stock.quantity, Utc::now())
            .await
            .map_err(|e| SyncError::reconciliation(&record.sku, e.to_string()))?;
        Ok(ReconcileOutcome::Updated)
    }
}
