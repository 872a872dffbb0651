//! Stock checker
//!
//! A narrower crawler variant that revisits a known product page and
//! extracts only stock presence/quantity, without a full re-scrape.

use tracing::debug;

use crate::domain::error::SyncResult;
use crate::domain::product::StockInfo;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::SupplierConfig;
use crate::infrastructure::extractor::SupplierExtractor;

pub struct StockChecker {
    extractor: SupplierExtractor,
    supplier: SupplierConfig,
}

impl StockChecker {
    pub fn new(extractor: SupplierExtractor, supplier: SupplierConfig) -> Self {
        Self { extractor, supplier }
    }

    /// Check stock for one SKU. `source_url` is the detail page captured
    /// when the record was created; when absent, a best-guess URL is built
    /// from the SKU.
    pub async fn check_stock(
        &self,
        browser: &mut dyn BrowserSession,
        sku: &str,
        source_url: Option<&str>,
    ) -> SyncResult<StockInfo> {
        let url = match source_url {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => self.supplier.product_url(sku),
        };

        let html = browser.goto(&url).await?;
        let stock = self.extractor.extract_stock(&html);
        debug!(
            sku,
            in_stock = stock.in_stock,
            quantity = ?stock.quantity,
            "stock checked"
        );
        Ok(stock)
    }
}
