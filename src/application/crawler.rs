//! Catalog crawler
//!
//! Walks the configured collection pages through an authenticated browser
//! session, paginating until exhaustion, a per-collection page ceiling, or
//! the configured product cap. All crawl state (seen URLs, collected
//! candidates) is scoped to a single run and passed explicitly, never held
//! in module state.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::error::{SyncError, SyncResult};
use crate::domain::product::CandidateProduct;
use crate::domain::settings::SyncSettings;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::extractor::SupplierExtractor;

/// Ceiling guarding against infinite-pagination bugs on the remote site.
const MAX_PAGES_PER_COLLECTION: u32 = 50;

/// Mutable state of one crawl run.
#[derive(Debug, Default)]
struct CrawlState {
    /// Detail URLs already collected, across all collections, so a product
    /// appearing in two collections is counted once.
    seen_urls: HashSet<String>,
    candidates: Vec<CandidateProduct>,
}

pub struct CatalogCrawler {
    extractor: SupplierExtractor,
    /// Collection index pages, in crawl order.
    collections: Vec<String>,
    max_pages_per_collection: u32,
}

impl CatalogCrawler {
    pub fn new(extractor: SupplierExtractor, collections: Vec<String>) -> Self {
        Self {
            extractor,
            collections,
            max_pages_per_collection: MAX_PAGES_PER_COLLECTION,
        }
    }

    /// Crawl every collection and return at most `settings.max_products`
    /// candidates. A collection that fails to load is skipped with a
    /// warning; the crawl continues with the next one.
    pub async fn crawl_catalog(
        &self,
        browser: &mut dyn BrowserSession,
        settings: &SyncSettings,
        cancel: &CancellationToken,
    ) -> SyncResult<Vec<CandidateProduct>> {
        let mut state = CrawlState::default();

        'collections: for collection_url in &self.collections {
            let category = category_from_collection_url(collection_url);
            let mut page_url = collection_url.clone();
            let mut pages_visited = 0u32;

            loop {
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                // Checked before any fetch so a zero cap never navigates and
                // a filled cap never costs an extra page load.
                if state.candidates.len() >= settings.max_products {
                    info!(
                        max_products = settings.max_products,
                        "product cap reached, stopping crawl"
                    );
                    break 'collections;
                }
                if pages_visited >= self.max_pages_per_collection {
                    warn!(
                        collection = collection_url.as_str(),
                        ceiling = self.max_pages_per_collection,
                        "pagination ceiling reached, moving to next collection"
                    );
                    break;
                }

                let html = match browser.goto(&page_url).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(
                            collection = collection_url.as_str(),
                            url = page_url.as_str(),
                            error = %e,
                            "collection page failed to load, skipping collection"
                        );
                        continue 'collections;
                    }
                };
                pages_visited += 1;

                let listing = self.extractor.extract_listing_page(&html, &category);
                debug!(
                    url = page_url.as_str(),
                    found = listing.candidates.len(),
                    "listing page extracted"
                );

                for candidate in listing.candidates {
                    if state.candidates.len() >= settings.max_products {
                        break;
                    }
                    if !state.seen_urls.insert(candidate.source_url.clone()) {
                        continue;
                    }
                    state.candidates.push(candidate);
                }

                match listing.next_page_url {
                    // Guard against a "next" link pointing back at itself.
                    Some(next) if next != page_url => page_url = next,
                    _ => break,
                }
            }
        }

        info!(candidates = state.candidates.len(), "crawl finished");
        Ok(state.candidates)
    }
}

/// Derive a display category from a collection URL's trailing path segment.
/// The catch-all collection maps to no category.
fn category_from_collection_url(url: &str) -> String {
    let segment = url
        .split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("");

    if segment.is_empty() || segment.eq_ignore_ascii_case("all") {
        return String::new();
    }

    segment
        .split('-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
