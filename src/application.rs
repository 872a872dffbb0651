//! Application layer: the sync engine proper.
//!
//! Crawling, reconciliation and run orchestration compose the domain and
//! infrastructure layers; the admin surface exposes the manual operations.

pub mod admin;
pub mod crawler;
pub mod orchestrator;
pub mod reconciler;
pub mod stock_checker;

pub use admin::{AdminService, RepriceRequest};
pub use crawler::CatalogCrawler;
pub use orchestrator::{BrowserFactory, SyncOrchestrator};
pub use reconciler::{ReconcileOutcome, ReconciliationEngine};
pub use stock_checker::StockChecker;
