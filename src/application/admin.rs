//! Admin surface
//!
//! The operations an operator drives by hand: triggering syncs, inspecting
//! run history, tuning settings, browsing the catalog, and the manual
//! overrides (activation, exclusion, repricing) that sync runs must respect.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::info;

use crate::application::orchestrator::SyncOrchestrator;
use crate::domain::error::{SyncError, SyncResult};
use crate::domain::pricing;
use crate::domain::product::{CatalogFilter, CatalogRecord};
use crate::domain::settings::{SettingsPatch, SyncSettings};
use crate::domain::sync_log::{SyncLogEntry, SyncType};
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::settings_repository::SettingsRepository;
use crate::infrastructure::sync_log_repository::SyncLogRepository;

/// A manual repricing request for one SKU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepriceRequest {
    /// Set the margin and derive the retail price from the stored wholesale
    /// cost.
    Margin(f64),
    /// Set the retail price directly and derive the implied margin.
    Retail(f64),
}

pub struct AdminService {
    orchestrator: Arc<SyncOrchestrator>,
    catalog: CatalogRepository,
    logs: SyncLogRepository,
    settings: SettingsRepository,
}

impl AdminService {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, pool: Arc<SqlitePool>) -> Self {
        Self {
            orchestrator,
            catalog: CatalogRepository::new(pool.clone()),
            logs: SyncLogRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool),
        }
    }

    pub async fn trigger_full_sync(&self) -> SyncResult<SyncLogEntry> {
        self.orchestrator.run(SyncType::Full).await
    }

    pub async fn trigger_incremental_sync(&self) -> SyncResult<SyncLogEntry> {
        self.orchestrator.run(SyncType::Incremental).await
    }

    pub async fn trigger_stock_check(&self) -> SyncResult<SyncLogEntry> {
        self.orchestrator.run(SyncType::StockCheck).await
    }

    pub fn cancel_sync(&self) {
        self.orchestrator.cancel();
    }

    /// Most recent runs first.
    pub async fn recent_sync_status(&self, limit: i64) -> SyncResult<Vec<SyncLogEntry>> {
        self.logs.recent(limit).await
    }

    pub async fn settings(&self) -> SyncResult<SyncSettings> {
        self.settings.load_or_default().await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> SyncResult<SyncSettings> {
        let mut settings = self.settings.load_or_default().await?;
        settings.apply(patch);
        self.settings.save(&settings).await?;
        info!("sync settings updated");
        Ok(settings)
    }

    pub async fn list_catalog(
        &self,
        filter: &CatalogFilter,
        page: u32,
        page_size: u32,
    ) -> SyncResult<Vec<CatalogRecord>> {
        self.catalog.list(filter, page, page_size).await
    }

    pub async fn catalog_count(&self) -> SyncResult<i64> {
        self.catalog.count().await
    }

    pub async fn set_active(&self, sku: &str, active: bool) -> SyncResult<CatalogRecord> {
        self.require(sku).await?;
        self.catalog.set_active(sku, active).await?;
        info!(sku, active, "record activation changed");
        self.require(sku).await
    }

    pub async fn set_excluded(&self, sku: &str, excluded: bool) -> SyncResult<CatalogRecord> {
        self.require(sku).await?;
        self.catalog.set_excluded(sku, excluded).await?;
        info!(sku, excluded, "record exclusion changed");
        self.require(sku).await
    }

    /// Manually reprice a record. The new margin sticks: subsequent syncs
    /// recompute retail from it rather than overwriting it.
    pub async fn reprice(&self, sku: &str, request: RepriceRequest) -> SyncResult<CatalogRecord> {
        let record = self.require(sku).await?;

        let (retail, margin) = match request {
            RepriceRequest::Margin(margin) => (
                pricing::retail_price(record.wholesale_price, margin),
                margin,
            ),
            RepriceRequest::Retail(retail) => (
                retail,
                pricing::margin_percent(record.wholesale_price, retail),
            ),
        };

        let retail = pricing::round_currency(retail);
        self.catalog.update_pricing(sku, retail, margin).await?;
        info!(sku, retail, margin, "record repriced");
        self.require(sku).await
    }

    async fn require(&self, sku: &str) -> SyncResult<CatalogRecord> {
        self.catalog
            .find_by_sku(sku)
            .await?
            .ok_or_else(|| SyncError::reconciliation(sku, "no catalog record with this SKU"))
    }
}
