//! Synchronization settings singleton
//!
//! Persisted as the sole row for key `"default"`, created with defaults on
//! first use, and read at the start of every sync run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Logical key of the settings singleton row.
pub const SETTINGS_KEY: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Whether the scheduler should start syncs on its own.
    pub auto_sync: bool,
    pub sync_interval_minutes: u32,
    /// Category allow-list. Empty means "do not filter by category".
    pub categories: BTreeSet<String>,
    /// Brand allow-list. Empty means "do not filter by brand".
    pub brands: BTreeSet<String>,
    /// Margin applied when pricing a product seen for the first time.
    pub default_margin_percent: f64,
    /// Eligibility floor: candidates whose computed margin falls below this
    /// are skipped.
    pub min_margin_percent: f64,
    /// Hard cap on candidates collected by a single full crawl.
    pub max_products: usize,
    pub update_prices: bool,
    pub update_stock: bool,
    pub update_descriptions: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: false,
            sync_interval_minutes: 24 * 60,
            categories: BTreeSet::new(),
            brands: BTreeSet::new(),
            default_margin_percent: 40.0,
            min_margin_percent: 20.0,
            max_products: 500,
            update_prices: true,
            update_stock: true,
            update_descriptions: true,
        }
    }
}

/// Partial settings update applied by the admin surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub auto_sync: Option<bool>,
    pub sync_interval_minutes: Option<u32>,
    pub categories: Option<BTreeSet<String>>,
    pub brands: Option<BTreeSet<String>>,
    pub default_margin_percent: Option<f64>,
    pub min_margin_percent: Option<f64>,
    pub max_products: Option<usize>,
    pub update_prices: Option<bool>,
    pub update_stock: Option<bool>,
    pub update_descriptions: Option<bool>,
}

impl SyncSettings {
    /// Apply a partial update, leaving unset fields untouched.
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.auto_sync {
            self.auto_sync = v;
        }
        if let Some(v) = patch.sync_interval_minutes {
            self.sync_interval_minutes = v;
        }
        if let Some(v) = patch.categories {
            self.categories = v;
        }
        if let Some(v) = patch.brands {
            self.brands = v;
        }
        if let Some(v) = patch.default_margin_percent {
            self.default_margin_percent = v;
        }
        if let Some(v) = patch.min_margin_percent {
            self.min_margin_percent = v;
        }
        if let Some(v) = patch.max_products {
            self.max_products = v;
        }
        if let Some(v) = patch.update_prices {
            self.update_prices = v;
        }
        if let Some(v) = patch.update_stock {
            self.update_stock = v;
        }
        if let Some(v) = patch.update_descriptions {
            self.update_descriptions = v;
        }
    }
}
