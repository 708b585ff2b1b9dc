//! Crawl stages and the pipeline driving them
//!
//! Each stage is a function over explicit inputs and accumulators:
//!
//! - [`category`] - navigation tree → category links
//! - [`listing`] - category links → item identifiers
//! - [`detail`] - item identifiers → item records
//! - [`pipeline`] - sequences the stages and owns the run state

pub mod category;
pub mod detail;
pub mod listing;
pub mod pipeline;

pub use category::enumerate_categories;
pub use detail::{extract_details, extract_item, extract_name, ItemOutcome};
pub use listing::{enumerate_items, listing_url};
pub use pipeline::{Pipeline, RunReport, Stage};
