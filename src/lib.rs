//! Wholesale catalog synchronization engine
//!
//! Keeps a local retail catalog aligned with a wholesale supplier's web
//! portal: authenticated crawling of the supplier's collection pages,
//! margin-based pricing, SKU-keyed reconciliation, and audited sync runs
//! (full, incremental, stock check).

pub mod application;
pub mod domain;
pub mod infrastructure;
