//! Sync orchestrator
//!
//! Drives the three sync modes end to end: authenticate, gather, reconcile,
//! finalize. Exactly one run may execute at a time; a second trigger is
//! rejected immediately rather than queued. Every run is bracketed by an
//! audit log entry that starts `running` and finalizes to `completed` or
//! `failed` exactly once, and the browser session is always closed before
//! finalization regardless of outcome.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::crawler::CatalogCrawler;
use crate::application::reconciler::{ReconcileOutcome, ReconciliationEngine};
use crate::application::stock_checker::StockChecker;
use crate::domain::error::{SyncError, SyncResult};
use crate::domain::product::CatalogRecord;
use crate::domain::settings::SyncSettings;
use crate::domain::sync_log::{SyncItemError, SyncLogEntry, SyncType};
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::catalog_repository::CatalogRepository;
use crate::infrastructure::config::SupplierConfig;
use crate::infrastructure::extractor::SupplierExtractor;
use crate::infrastructure::settings_repository::SettingsRepository;
use crate::infrastructure::supplier_session::SessionManager;
use crate::infrastructure::sync_log_repository::{RunCounters, SyncLogRepository};

/// Records untouched for this long are considered stale by incremental sync.
const STALE_AFTER_HOURS: i64 = 24;

/// Upper bound on records refreshed per incremental run.
const INCREMENTAL_BATCH: i64 = 100;

/// Progress snapshot cadence, in processed items.
const PROGRESS_EVERY: u64 = 50;

/// Creates a fresh browser for each run, so a failed run never leaks
/// session state into the next one.
pub type BrowserFactory = Box<dyn Fn() -> SyncResult<Box<dyn BrowserSession>> + Send + Sync>;

pub struct SyncOrchestrator {
    supplier: SupplierConfig,
    extractor: SupplierExtractor,
    crawler: CatalogCrawler,
    stock_checker: StockChecker,
    reconciler: ReconciliationEngine,
    catalog: CatalogRepository,
    logs: SyncLogRepository,
    settings: SettingsRepository,
    browser_factory: BrowserFactory,
    run_lock: tokio::sync::Mutex<()>,
    cancel: std::sync::Mutex<CancellationToken>,
}

impl SyncOrchestrator {
    pub fn new(
        supplier: SupplierConfig,
        extractor: SupplierExtractor,
        pool: Arc<SqlitePool>,
        browser_factory: BrowserFactory,
    ) -> Self {
        let catalog = CatalogRepository::new(pool.clone());
        Self {
            crawler: CatalogCrawler::new(extractor.clone(), supplier.collection_urls()),
            stock_checker: StockChecker::new(extractor.clone(), supplier.clone()),
            reconciler: ReconciliationEngine::new(catalog.clone()),
            logs: SyncLogRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool),
            catalog,
            extractor,
            supplier,
            browser_factory,
            run_lock: tokio::sync::Mutex::new(()),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
        }
    }

    /// Request cancellation of the run in flight, if any. The run notices at
    /// the next item boundary and finalizes as failed.
    pub fn cancel(&self) {
        if let Ok(token) = self.cancel.lock() {
            token.cancel();
        }
    }

    /// Execute one sync run of the given type.
    ///
    /// Returns `Err(RunInProgress)` without side effects when another run
    /// holds the lock. A run that starts always produces a finalized log
    /// entry; fatal errors surface as an entry with status `failed`, not as
    /// an `Err` from this method.
    pub async fn run(&self, sync_type: SyncType) -> SyncResult<SyncLogEntry> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| SyncError::RunInProgress)?;

        let cancel = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = cancel.clone();
        }

        let settings = self.settings.load_or_default().await?;
        let id = Uuid::new_v4().to_string();
        self.logs.create(&id, sync_type).await?;
        info!(run = id.as_str(), sync_type = sync_type.as_str(), "sync run started");

        let browser = match (self.browser_factory)() {
            Ok(browser) => browser,
            Err(e) => return self.finalize_failed(&id, &e).await,
        };
        let mut session = SessionManager::new(browser, self.supplier.clone());

        let mut counters = RunCounters::default();
        let mut errors = Vec::new();
        let outcome = self
            .execute(sync_type, &mut session, &settings, &cancel, &id, &mut counters, &mut errors)
            .await;

        // Cleanup happens before finalization so a completed entry never
        // coexists with a live supplier session.
        session.close().await;

        match outcome {
            Ok(()) => {
                let entry = self
                    .logs
                    .complete(&id, &counters, &errors)
                    .await?
                    .ok_or_else(|| SyncError::Other(anyhow!("sync log {id} missing after completion")))?;
                info!(
                    run = id.as_str(),
                    processed = counters.processed,
                    created = counters.created,
                    updated = counters.updated,
                    skipped = counters.skipped,
                    item_errors = errors.len(),
                    "sync run completed"
                );
                Ok(entry)
            }
            Err(e) => self.finalize_failed(&id, &e).await,
        }
    }

    async fn finalize_failed(&self, id: &str, cause: &SyncError) -> SyncResult<SyncLogEntry> {
        error!(run = id, error = %cause, "sync run failed");
        self.logs
            .fail(id, &cause.to_string())
            .await?
            .ok_or_else(|| SyncError::Other(anyhow!("sync log {id} missing after failure")))
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        sync_type: SyncType,
        session: &mut SessionManager,
        settings: &SyncSettings,
        cancel: &CancellationToken,
        id: &str,
        counters: &mut RunCounters,
        errors: &mut Vec<SyncItemError>,
    ) -> SyncResult<()> {
        session.authenticate().await?;

        match sync_type {
            SyncType::Full => self.run_full(session, settings, cancel, id, counters, errors).await,
            SyncType::Incremental => {
                self.run_incremental(session, settings, cancel, id, counters, errors).await
            }
            SyncType::StockCheck => {
                self.run_stock_check(session, settings, cancel, id, counters, errors).await
            }
        }
    }

    async fn run_full(
        &self,
        session: &mut SessionManager,
        settings: &SyncSettings,
        cancel: &CancellationToken,
        id: &str,
        counters: &mut RunCounters,
        errors: &mut Vec<SyncItemError>,
    ) -> SyncResult<()> {
        let candidates = self
            .crawler
            .crawl_catalog(session.browser_mut(), settings, cancel)
            .await?;

        for candidate in &candidates {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            counters.processed += 1;

            match self.reconciler.reconcile(candidate, settings).await {
                Ok(outcome) => bump(counters, outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(sku = candidate.sku.as_str(), error = %e, "candidate failed, continuing");
                    errors.push(SyncItemError::new(&candidate.sku, e.to_string()));
                }
            }

            self.snapshot(id, counters).await;
        }
        Ok(())
    }

    async fn run_incremental(
        &self,
        session: &mut SessionManager,
        settings: &SyncSettings,
        cancel: &CancellationToken,
        id: &str,
        counters: &mut RunCounters,
        errors: &mut Vec<SyncItemError>,
    ) -> SyncResult<()> {
        let cutoff = Utc::now() - Duration::hours(STALE_AFTER_HOURS);
        let stale = self.catalog.stale_records(cutoff, INCREMENTAL_BATCH).await?;
        info!(stale = stale.len(), "incremental sync refreshing stale records");

        for record in &stale {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            counters.processed += 1;

            match self.refresh_record(session.browser_mut(), record, settings).await {
                Ok(outcome) => bump(counters, outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(sku = record.sku.as_str(), error = %e, "refresh failed, continuing");
                    errors.push(SyncItemError::new(&record.sku, e.to_string()));
                }
            }

            self.snapshot(id, counters).await;
        }
        Ok(())
    }

    /// Re-fetch one record's detail page and reconcile the result. The
    /// candidate is re-keyed to the record's SKU in case the page derives a
    /// different identifier than the one originally stored.
    async fn refresh_record(
        &self,
        browser: &mut dyn BrowserSession,
        record: &CatalogRecord,
        settings: &SyncSettings,
    ) -> SyncResult<ReconcileOutcome> {
        let url = if record.source_url.is_empty() {
            self.supplier.product_url(&record.sku)
        } else {
            record.source_url.clone()
        };

        let html = browser.goto(&url).await?;
        let mut candidate = self
            .extractor
            .extract_product_detail(&html, &url)
            .ok_or_else(|| SyncError::Extraction(format!("no product detail found at {url}")))?;
        candidate.sku = record.sku.clone();

        self.reconciler.reconcile(&candidate, settings).await
    }

    async fn run_stock_check(
        &self,
        session: &mut SessionManager,
        settings: &SyncSettings,
        cancel: &CancellationToken,
        id: &str,
        counters: &mut RunCounters,
        errors: &mut Vec<SyncItemError>,
    ) -> SyncResult<()> {
        let records = self.catalog.all_records().await?;
        info!(records = records.len(), "stock check started");

        for record in &records {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            counters.processed += 1;

            // Excluded records are not even fetched.
            if record.excluded {
                counters.skipped += 1;
                continue;
            }

            let stock = match self
                .stock_checker
                .check_stock(session.browser_mut(), &record.sku, Some(&record.source_url))
                .await
            {
                Ok(stock) => stock,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(sku = record.sku.as_str(), error = %e, "stock check failed, continuing");
                    errors.push(SyncItemError::new(&record.sku, e.to_string()));
                    continue;
                }
            };

            match self.reconciler.apply_stock(record, &stock, settings).await {
                Ok(outcome) => bump(counters, outcome),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => errors.push(SyncItemError::new(&record.sku, e.to_string())),
            }

            self.snapshot(id, counters).await;
        }
        Ok(())
    }

    /// Persist a progress snapshot at a fixed cadence. Snapshot failures are
    /// logged but never abort the run.
    async fn snapshot(&self, id: &str, counters: &RunCounters) {
        if counters.processed % PROGRESS_EVERY != 0 {
            return;
        }
        if let Err(e) = self.logs.update_progress(id, counters).await {
            warn!(run = id, error = %e, "progress snapshot failed");
        }
    }
}

fn bump(counters: &mut RunCounters, outcome: ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Created => counters.created += 1,
        ReconcileOutcome::Updated => counters.updated += 1,
        ReconcileOutcome::Skipped => counters.skipped += 1,
    }
}
