//! Renderer abstraction for browser-based page rendering
//!
//! [`Renderer`] is the capability the crawl stages consume: navigate, query the
//! rendered tree, deep-expand nodes and capture screenshots. Stages never call
//! a renderer directly; they go through [`RenderSession`], which adds retries,
//! navigation pacing, readiness waits and cancellation.

#[cfg(feature = "chromium")]
pub mod chromium;
pub mod html;
pub mod session;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;
pub use html::HtmlRenderer;
pub use session::RenderSession;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::dom::{Depth, RenderedNode};
use crate::utils::error::RendererError;

/// Polling bounds for [`Renderer::wait_ready`]
#[derive(Debug, Clone, Copy)]
pub struct ReadyPolicy {
    pub timeout: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

/// A browser context that renders pages and exposes their node tree
///
/// Implementations hold a single page; every navigation invalidates the
/// handles of nodes returned for the previous document.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load a URL and wait for the navigation to complete
    async fn navigate(&self, url: &str) -> Result<(), RendererError>;

    /// Shallow nodes matching a CSS selector in the current document
    async fn query(&self, selector: &str) -> Result<Vec<RenderedNode>, RendererError>;

    /// Shallow nodes matching a CSS selector among the descendants of `root`
    ///
    /// Fails with [`RendererError::StaleNode`] when `root` came from an
    /// earlier document.
    async fn query_within(
        &self,
        root: &RenderedNode,
        selector: &str,
    ) -> Result<Vec<RenderedNode>, RendererError>;

    /// The node again, with its children materialized to `depth`
    async fn expand(&self, node: &RenderedNode, depth: Depth)
        -> Result<RenderedNode, RendererError>;

    /// Rasterized capture of the full current page
    async fn screenshot(&self) -> Result<Vec<u8>, RendererError>;

    /// Number of nodes matching a selector
    async fn count(&self, selector: &str) -> Result<usize, RendererError> {
        Ok(self.query(selector).await?.len())
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Poll until `selector` matches and the match count holds steady between
    /// two polls, backing off exponentially
    ///
    /// Returns `Ok(false)` when the timeout elapses first.
    async fn wait_ready(&self, selector: &str, policy: ReadyPolicy) -> Result<bool, RendererError> {
        let deadline = Instant::now() + policy.timeout;
        let mut interval = policy.initial_interval;
        let mut previous = None;

        loop {
            let count = self.count(selector).await?;
            if count > 0 && previous == Some(count) {
                return Ok(true);
            }
            previous = Some(count);

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            self.sleep(interval.min(deadline - now)).await;
            interval = (interval * 2).min(policy.max_interval);
        }
    }
}
