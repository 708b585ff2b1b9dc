//! tdcrawl - Test directory catalog crawler
//!
//! Crawls a rendered, client-side test directory: category links from the
//! navigation tree, item identifiers from each category listing, and a display
//! name from each item's detail page.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and the target site contract
//! - [`dom`] - Rendered node tree model and tree printer
//! - [`renderer`] - Renderer capability, Chromium and static-HTML renderers
//! - [`crawler`] - Crawl stages and the pipeline driver
//! - [`models`] - Identifiers, records and run accumulators
//! - [`storage`] - Record output and screenshot files
//! - [`utils`] - Retry, URL and text helpers
//!
//! # Example
//!
//! ```no_run
//! use tdcrawl::prelude::*;
//! use tokio::sync::watch;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let renderer = ChromiumRenderer::launch(&config.renderer).await?;
//! let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//! let session = RenderSession::new(
//!     &renderer,
//!     config.retry.clone(),
//!     config.settle.clone(),
//!     shutdown_rx,
//! );
//!
//! let mut records = Vec::new();
//! let report = Pipeline::new(&session, &config).run(&mut records).await;
//! println!("{} records, success: {}", records.len(), report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crawler;
pub mod dom;
pub mod error;
pub mod models;
pub mod renderer;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CategoryScope, Config, FailurePolicy, NameSource};
    pub use crate::crawler::{Pipeline, RunReport, Stage};
    pub use crate::dom::{Depth, RenderedNode, TreePrinter};
    pub use crate::error::{CrawlErrorTrait, Error, ErrorCategory, JoinedError, Result};
    pub use crate::models::{ItemIdentifier, ItemRecord, ResultSet, RunStats};
    #[cfg(feature = "chromium")]
    pub use crate::renderer::ChromiumRenderer;
    pub use crate::renderer::{HtmlRenderer, RenderSession, Renderer};
    pub use crate::storage::{JsonLinesWriter, RecordSink};
}

// Direct re-exports for convenience
pub use models::{ItemIdentifier, ItemRecord, ResultSet};
