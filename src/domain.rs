//! Domain layer: entities, settings, pricing rules and the error taxonomy
//!
//! Everything here is storage- and transport-agnostic; the infrastructure
//! layer owns persistence and the supplier site boundary.

pub mod error;
pub mod pricing;
pub mod product;
pub mod settings;
pub mod sync_log;

pub use error::{SyncError, SyncResult};
pub use product::{CandidateProduct, CatalogFilter, CatalogRecord, StockInfo};
pub use settings::{SettingsPatch, SyncSettings, SETTINGS_KEY};
pub use sync_log::{SyncItemError, SyncLogEntry, SyncStatus, SyncType};
