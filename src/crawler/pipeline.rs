//! Sequential crawl pipeline
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────────┐   ┌───────────┐   ┌────────────┐   ┌──────┐
//! │  Start  │──▶│ Enumerate  │──▶│ Enumerate │──▶│  Extract   │──▶│ Done │
//! │         │   │ Categories │   │   Items   │   │  Details   │   │      │
//! └─────────┘   └────────────┘   └───────────┘   └────────────┘   └──────┘
//!                     │                │                │
//!               category links     ItemIndex        ResultSet
//! ```
//!
//! The [`Pipeline`] owns every accumulator of the run and lends them to one
//! stage at a time. Stage errors are joined into the run error; `Done` is
//! reached whether or not a stage failed. An interruption jumps straight to
//! `Done`, keeping what was accumulated so far.

use std::fmt;
use tracing::{info, warn};

use super::category::enumerate_categories;
use super::detail::extract_details;
use super::listing::enumerate_items;
use crate::config::{Config, CrawlConfig, SiteConfig};
use crate::dom::RenderedNode;
use crate::error::JoinedError;
use crate::models::{CategoryLink, ItemIndex, ResultSet, RunStats};
use crate::renderer::{RenderSession, Renderer};
use crate::storage::RecordSink;
use crate::utils::error::RendererError;

// ============================================================================
// Stages
// ============================================================================

/// Position of the pipeline in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    EnumerateCategories,
    EnumerateItems,
    ExtractDetails,
    Done,
}

impl Stage {
    /// The stage after this one
    pub fn next(self) -> Self {
        match self {
            Self::Start => Self::EnumerateCategories,
            Self::EnumerateCategories => Self::EnumerateItems,
            Self::EnumerateItems => Self::ExtractDetails,
            Self::ExtractDetails | Self::Done => Self::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::EnumerateCategories => "enumerate_categories",
            Self::EnumerateItems => "enumerate_items",
            Self::ExtractDetails => "extract_details",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Run report
// ============================================================================

/// Outcome of a pipeline run
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    /// Every stage failure, in the order it occurred
    pub error: Option<JoinedError>,
    /// Whether the run was interrupted before completing every stage
    pub interrupted: bool,
    /// Last detail-page capture
    pub screenshot: Option<Vec<u8>>,
}

impl RunReport {
    /// A run that finished every stage without errors
    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.interrupted
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Drives the stages over one [`RenderSession`]
pub struct Pipeline<'s, 'r, R: Renderer + ?Sized> {
    session: &'s RenderSession<'r, R>,
    site: SiteConfig,
    crawl: CrawlConfig,
    stage: Stage,
    categories: Vec<CategoryLink>,
    index: ItemIndex,
    results: ResultSet,
    stats: RunStats,
    errors: JoinedError,
    screenshot: Option<Vec<u8>>,
    interrupted: bool,
}

impl<'s, 'r, R: Renderer + ?Sized> Pipeline<'s, 'r, R> {
    pub fn new(session: &'s RenderSession<'r, R>, config: &Config) -> Self {
        Self {
            session,
            site: config.site.clone(),
            crawl: config.crawl.clone(),
            stage: Stage::Start,
            categories: Vec::new(),
            index: ItemIndex::new(),
            results: ResultSet::new(),
            stats: RunStats::new(),
            errors: JoinedError::new(),
            screenshot: None,
            interrupted: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Category links found by the first stage
    pub fn categories(&self) -> &[CategoryLink] {
        &self.categories
    }

    /// Identifiers discovered so far
    pub fn index(&self) -> &ItemIndex {
        &self.index
    }

    /// Records extracted so far
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_results(self) -> ResultSet {
        self.results
    }

    /// Run every remaining stage and report
    ///
    /// Records are handed to `sink` as they are extracted.
    pub async fn run<S: RecordSink + ?Sized>(&mut self, sink: &mut S) -> RunReport {
        info!(
            root = %self.site.root_url,
            scope = ?self.crawl.category_scope,
            "Starting crawl pipeline"
        );

        while self.stage != Stage::Done {
            self.step(sink).await;
        }

        self.stats.finish();
        info!(
            categories = self.stats.categories,
            categories_visited = self.stats.categories_visited,
            identifiers = self.index.len(),
            items_visited = self.stats.items_visited,
            records = self.results.len(),
            title_failures = self.stats.title_failures,
            item_failures = self.stats.item_failures,
            errors = self.errors.len(),
            interrupted = self.interrupted,
            elapsed_secs = ?self.stats.elapsed_secs(),
            "Pipeline completed"
        );

        RunReport {
            stats: self.stats.clone(),
            error: std::mem::take(&mut self.errors).into_result().err(),
            interrupted: self.interrupted,
            screenshot: self.screenshot.take(),
        }
    }

    /// Execute the current stage and advance
    pub async fn step<S: RecordSink + ?Sized>(&mut self, sink: &mut S) -> Stage {
        match self.stage {
            Stage::Start | Stage::Done => {}
            Stage::EnumerateCategories => self.enumerate_categories().await,
            Stage::EnumerateItems => {
                let errors = enumerate_items(
                    self.session,
                    &self.site,
                    self.crawl.category_scope,
                    &self.categories,
                    &mut self.index,
                    &mut self.stats,
                )
                .await;
                self.errors.join(errors);
            }
            Stage::ExtractDetails => {
                let summary = extract_details(
                    self.session,
                    &self.site,
                    &self.crawl,
                    &self.index,
                    &mut self.results,
                    &mut self.stats,
                    sink,
                )
                .await;
                self.errors.join(summary.errors);
                if summary.screenshot.is_some() {
                    self.screenshot = summary.screenshot;
                }
            }
        }

        if self.session.is_cancelled() && self.stage != Stage::Done {
            warn!(stage = %self.stage, "Run interrupted");
            self.interrupted = true;
            self.stage = Stage::Done;
        } else {
            self.stage = self.stage.next();
        }
        self.stage
    }

    async fn enumerate_categories(&mut self) {
        let entries = match self.navigation_entries().await {
            Ok(entries) => entries,
            Err(RendererError::Cancelled) => return,
            Err(e) => {
                warn!(root = %self.site.root_url, error = %e, "Navigation tree unavailable");
                self.errors.push(e);
                return;
            }
        };

        let (links, errors) = enumerate_categories(self.session, &entries).await;
        self.stats.categories = links.len() as u64;
        self.categories = links;
        self.errors.join(errors);
    }

    async fn navigation_entries(&self) -> Result<Vec<RenderedNode>, RendererError> {
        self.session.navigate(&self.site.root_url).await?;
        self.session.settle(&self.site.navigation_selector).await?;
        self.session.query(&self.site.navigation_selector).await
    }
}
