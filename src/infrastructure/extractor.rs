//! HTML extraction for the wholesale supplier site
//!
//! The remote markup is not controlled by this system, so every field is
//! located through an ordered list of selector candidates tried in sequence;
//! the first match wins. A listing missing a name, price or link is
//! discarded rather than reported as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::product::{CandidateProduct, StockInfo};

/// Phrases that mark a product page as out of stock.
const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "out of stock",
    "sold out",
    "currently unavailable",
    "notify me when",
];

static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:qty|quantity)\s*[:=]?\s*(\d+)|(\d+)\s+in stock").unwrap());

/// Configuration for supplier site data extraction.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub listing: ListingSelectors,
    pub detail: DetailSelectors,
    /// "Next page" affordance candidates, in preference order.
    pub pagination_next: Vec<String>,
    /// Base URL for resolving relative links.
    pub base_url: String,
}

/// CSS selector fallbacks for product listing cards.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub card: Vec<String>,
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub link: Vec<String>,
    pub image: Vec<String>,
    pub brand: Vec<String>,
}

/// CSS selector fallbacks for product detail pages.
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub brand: Vec<String>,
    pub category: Vec<String>,
    pub description: Vec<String>,
    pub image: Vec<String>,
}

impl ExtractorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            listing: ListingSelectors {
                card: to_strings(&[
                    ".product-card",
                    "li.product",
                    ".product-item",
                    ".grid__item",
                    "article.card",
                ]),
                title: to_strings(&[
                    ".product-title",
                    ".product-item__title",
                    ".card__heading",
                    "h2 a",
                    "h3 a",
                ]),
                price: to_strings(&[".price", ".product-price", ".money", "[data-price]"]),
                link: to_strings(&["a[href*='/products/']", "a[href*='/product/']", "a"]),
                image: to_strings(&["img"]),
                brand: to_strings(&[".product-vendor", ".vendor", ".brand", "[data-vendor]"]),
            },
            detail: DetailSelectors {
                title: to_strings(&["h1.product-title", ".product__title", "h1"]),
                price: to_strings(&[".price", ".product-price", ".money", "[data-price]"]),
                brand: to_strings(&[".product-vendor", ".vendor", ".brand", "[data-vendor]"]),
                category: to_strings(&[
                    ".breadcrumb li:last-child",
                    ".product-category",
                    "[data-category]",
                ]),
                description: to_strings(&[
                    ".product-description",
                    ".product__description",
                    "#description",
                ]),
                image: to_strings(&[".product-gallery img", ".product__media img", "img"]),
            },
            pagination_next: to_strings(&[
                "a[rel='next']",
                ".pagination__next a",
                "a.pagination-next",
                "a[aria-label='Next']",
                "li.next a",
            ]),
            base_url: base_url.into(),
        }
    }
}

/// The result of extracting one listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub candidates: Vec<CandidateProduct>,
    pub next_page_url: Option<String>,
}

/// Selector-driven extractor for the supplier site.
#[derive(Clone)]
pub struct SupplierExtractor {
    config: ExtractorConfig,
}

impl SupplierExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ExtractorConfig::new(base_url),
        }
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Extract candidate products and the next-page link from a collection
    /// listing page. `default_category` is applied to candidates whose card
    /// carries no category of its own (the collection the page belongs to).
    pub fn extract_listing_page(&self, html: &str, default_category: &str) -> ListingPage {
        let document = Html::parse_document(html);

        let mut candidates = Vec::new();
        for card in self.select_cards(&document) {
            if let Some(candidate) = self.extract_card(&card, default_category) {
                candidates.push(candidate);
            }
        }

        let next_page_url = self.find_next_page(&document);
        debug!(
            candidates = candidates.len(),
            has_next = next_page_url.is_some(),
            "extracted listing page"
        );

        ListingPage {
            candidates,
            next_page_url,
        }
    }

    /// Extract a full candidate from a product detail page. Returns `None`
    /// when the page yields no name or price.
    pub fn extract_product_detail(&self, html: &str, url: &str) -> Option<CandidateProduct> {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let detail = &self.config.detail;

        let name = first_text(&root, &detail.title)?;
        let price = first_text(&root, &detail.price).and_then(|t| parse_price_text(&t))?;
        let sku = sku_from_url(url)?;

        let images = first_element(&root, &detail.image)
            .and_then(|img| image_source(&img))
            .map(|src| vec![resolve_url(&src, &self.config.base_url)])
            .unwrap_or_default();

        Some(CandidateProduct {
            sku,
            name,
            wholesale_price: price,
            images,
            category: first_text(&root, &detail.category).unwrap_or_default(),
            brand: first_text(&root, &detail.brand).unwrap_or_default(),
            description: first_text(&root, &detail.description),
            source_url: url.to_string(),
            stock: Some(self.extract_stock(html)),
        })
    }

    /// Extract stock presence/quantity from page text heuristics.
    ///
    /// Ambiguous pages default to in-stock with no quantity so a parsing
    /// miss never hides a product.
    pub fn extract_stock(&self, html: &str) -> StockInfo {
        let document = Html::parse_document(html);
        let text = document
            .root_element()
            .text()
            .collect::<String>()
            .to_lowercase();

        if OUT_OF_STOCK_PHRASES.iter().any(|p| text.contains(p)) {
            return StockInfo {
                in_stock: false,
                quantity: Some(0),
            };
        }

        let quantity = QUANTITY_RE.captures(&text).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .and_then(|m| m.as_str().parse::<i64>().ok())
        });

        StockInfo {
            in_stock: true,
            quantity,
        }
    }

    fn select_cards<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.config.listing.card {
            if let Ok(parsed) = Selector::parse(selector) {
                let cards: Vec<_> = document.select(&parsed).collect();
                if !cards.is_empty() {
                    return cards;
                }
            }
        }
        Vec::new()
    }

    fn extract_card(&self, card: &ElementRef, default_category: &str) -> Option<CandidateProduct> {
        let listing = &self.config.listing;

        // Name, price and link are mandatory; a card missing any of them is
        // discarded without counting as an error.
        let name = first_text(card, &listing.title)?;
        let price = first_text(card, &listing.price).and_then(|t| parse_price_text(&t))?;
        let href =
            first_element(card, &listing.link).and_then(|a| a.value().attr("href").map(String::from))?;

        let source_url = resolve_url(&href, &self.config.base_url);
        let sku = sku_from_url(&source_url)?;

        let images = first_element(card, &listing.image)
            .and_then(|img| image_source(&img))
            .map(|src| vec![resolve_url(&src, &self.config.base_url)])
            .unwrap_or_default();

        Some(CandidateProduct {
            sku,
            name,
            wholesale_price: price,
            images,
            category: default_category.to_string(),
            brand: first_text(card, &listing.brand).unwrap_or_default(),
            description: None,
            source_url,
            stock: None,
        })
    }

    fn find_next_page(&self, document: &Html) -> Option<String> {
        for selector in &self.config.pagination_next {
            if let Ok(parsed) = Selector::parse(selector) {
                if let Some(href) = document
                    .select(&parsed)
                    .next()
                    .and_then(|el| el.value().attr("href"))
                {
                    return Some(resolve_url(href, &self.config.base_url));
                }
            }
        }
        None
    }
}

/// Parse a price out of display text such as `"£1,234.50 ex VAT"`.
///
/// Thousands separators are stripped and the first numeric token wins.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    PRICE_RE
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Derive a SKU from the trailing path segment of a detail URL.
pub fn sku_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(|segment| segment.to_string())
        .filter(|sku| !sku.is_empty())
}

/// Resolve a possibly-relative href against the supplier base URL.
pub fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn first_element<'a>(scope: &ElementRef<'a>, selectors: &[String]) -> Option<ElementRef<'a>> {
    for selector in selectors {
        if let Ok(parsed) = Selector::parse(selector) {
            if let Some(element) = scope.select(&parsed).next() {
                return Some(element);
            }
        }
    }
    None
}

fn first_text(scope: &ElementRef, selectors: &[String]) -> Option<String> {
    first_element(scope, selectors)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

fn image_source(img: &ElementRef) -> Option<String> {
    img.value()
        .attr("src")
        .or_else(|| img.value().attr("data-src"))
        .map(String::from)
}
