//! Pure pricing computations and sync eligibility
//!
//! No I/O here. Prices stay un-rounded through intermediate computation and
//! are rounded to two decimal places only at the point of persistence or
//! display, so repeated syncs do not compound rounding error.

use crate::domain::product::CandidateProduct;
use crate::domain::settings::SyncSettings;

/// Retail price from wholesale cost and a margin percentage.
pub fn retail_price(wholesale: f64, margin_percent: f64) -> f64 {
    wholesale * (1.0 + margin_percent / 100.0)
}

/// Margin percentage implied by a wholesale/retail pair.
///
/// Returns 0 for non-positive wholesale prices rather than dividing by zero;
/// such candidates are rejected by eligibility anyway.
pub fn margin_percent(wholesale: f64, retail: f64) -> f64 {
    if wholesale <= 0.0 {
        return 0.0;
    }
    (retail - wholesale) / wholesale * 100.0
}

/// Round a currency value to two decimal places.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whether a candidate qualifies for the catalog under the current settings.
///
/// Empty candidate brand/category fields mean "unknown" and never filter a
/// candidate out, since extraction is best-effort. An empty allow-list
/// disables that filter entirely.
pub fn is_eligible(candidate: &CandidateProduct, computed_retail: f64, settings: &SyncSettings) -> bool {
    if !candidate.brand.is_empty()
        && !settings.brands.is_empty()
        && !settings.brands.contains(&candidate.brand)
    {
        return false;
    }

    if !candidate.category.is_empty()
        && !settings.categories.is_empty()
        && !settings.categories.contains(&candidate.category)
    {
        return false;
    }

    margin_percent(candidate.wholesale_price, computed_retail) >= settings.min_margin_percent
}
