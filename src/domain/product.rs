//! Catalog entities shared across the crawler, pricing and reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock information extracted from a product page.
///
/// Extraction is best-effort: when the page is ambiguous the safe default is
/// `in_stock = true` with no quantity, so a parsing miss never hides a
/// product from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    pub in_stock: bool,
    pub quantity: Option<i64>,
}

impl Default for StockInfo {
    fn default() -> Self {
        Self {
            in_stock: true,
            quantity: None,
        }
    }
}

/// A product candidate scraped from the supplier site.
///
/// Ephemeral: produced by the crawler, consumed by pricing and
/// reconciliation, never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProduct {
    /// Derived from the trailing path segment of the detail URL when the
    /// listing carries no explicit identifier.
    pub sku: String,
    pub name: String,
    pub wholesale_price: f64,
    pub images: Vec<String>,
    pub category: String,
    pub brand: String,
    /// Only present when the candidate came from a detail page.
    pub description: Option<String>,
    /// Supplier detail page this candidate was extracted from.
    pub source_url: String,
    pub stock: Option<StockInfo>,
}

/// A persisted catalog row, keyed by SKU.
///
/// Rows are never auto-deleted: a product that disappears from the supplier
/// site is left in place and only shows its age through `last_synced_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub sku: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub wholesale_price: f64,
    pub retail_price: f64,
    pub margin_percent: f64,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub in_stock: bool,
    pub stock_quantity: Option<i64>,
    pub flavours: Option<String>,
    pub strengths: Option<String>,
    pub ingredients: Option<String>,
    pub allergens: Option<String>,
    /// Manually togglable; an inactive record is hidden from the storefront
    /// without being deleted.
    pub active: bool,
    /// Manually excluded records are never overwritten by a sync run.
    pub excluded: bool,
    /// Supplier detail page captured when the record was first created.
    pub source_url: String,
    pub last_synced_at: DateTime<Utc>,
}

/// Filters accepted by the admin catalog listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Case-insensitive substring match against name and SKU.
    pub search: Option<String>,
    pub in_stock: Option<bool>,
    pub active: Option<bool>,
    pub excluded: Option<bool>,
}
