//! Infrastructure layer: configuration, logging, storage and the supplier
//! site boundary (HTTP session, HTML extraction).

pub mod browser;
pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod extractor;
pub mod logging;
pub mod settings_repository;
pub mod supplier_session;
pub mod sync_log_repository;

pub use browser::{BrowserSession, HttpBrowserSession};
pub use catalog_repository::CatalogRepository;
pub use config::AppConfig;
pub use database_connection::DatabaseConnection;
pub use extractor::SupplierExtractor;
pub use settings_repository::SettingsRepository;
pub use supplier_session::SessionManager;
pub use sync_log_repository::{RunCounters, SyncLogRepository};
