//! Renderer-call boundary shared by the crawl stages
//!
//! Every call made through a [`RenderSession`]:
//! - is abandoned with [`RendererError::Cancelled`] once shutdown is signalled,
//! - is retried with exponential backoff when the error is recoverable,
//! - and, for navigations, waits on the navigation rate limiter.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use tokio::sync::watch;

use super::{ReadyPolicy, Renderer};
use crate::config::{SettleConfig, SettleMode};
use crate::dom::{Depth, RenderedNode};
use crate::utils::error::RendererError;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Sequential, cancellable access to one renderer
pub struct RenderSession<'r, R: Renderer + ?Sized> {
    renderer: &'r R,
    retry: RetryConfig,
    settle: SettleConfig,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    shutdown: watch::Receiver<bool>,
}

impl<'r, R: Renderer + ?Sized> RenderSession<'r, R> {
    pub fn new(
        renderer: &'r R,
        retry: RetryConfig,
        settle: SettleConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            renderer,
            retry,
            settle,
            rate_limiter: None,
            shutdown,
        }
    }

    /// Limit navigations to `per_second` (0 disables the limit)
    #[must_use]
    pub fn with_navigation_rate(mut self, per_second: u32) -> Self {
        self.rate_limiter =
            NonZeroU32::new(per_second).map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        self
    }

    /// Whether shutdown has been signalled
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Navigate to `url`
    pub async fn navigate(&self, url: &str) -> Result<(), RendererError> {
        if let Some(limiter) = &self.rate_limiter {
            self.cancellable(async {
                limiter.until_ready().await;
                Ok(())
            })
            .await?;
        }

        tracing::debug!(url = %url, "Navigating");
        self.cancellable(with_retry_if(
            &self.retry,
            || self.renderer.navigate(url),
            RendererError::is_recoverable,
        ))
        .await
    }

    /// Wait until the page rendered the content matched by `selector`
    ///
    /// In poll mode a timeout is logged and tolerated: the following query
    /// reports what actually rendered.
    pub async fn settle(&self, selector: &str) -> Result<(), RendererError> {
        match self.settle.mode {
            SettleMode::Fixed => {
                let delay = self.settle.delay();
                if !delay.is_zero() {
                    self.cancellable(async {
                        self.renderer.sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
                Ok(())
            }
            SettleMode::Poll => {
                let policy = ReadyPolicy {
                    timeout: self.settle.timeout(),
                    initial_interval: self.settle.poll_interval(),
                    max_interval: self.settle.max_poll_interval(),
                };
                let ready = self
                    .cancellable(with_retry_if(
                        &self.retry,
                        || self.renderer.wait_ready(selector, policy),
                        RendererError::is_recoverable,
                    ))
                    .await?;
                if !ready {
                    tracing::warn!(
                        selector = %selector,
                        timeout_ms = self.settle.timeout_ms,
                        "Page did not settle before timeout"
                    );
                }
                Ok(())
            }
        }
    }

    /// Shallow nodes matching `selector`
    pub async fn query(&self, selector: &str) -> Result<Vec<RenderedNode>, RendererError> {
        self.cancellable(with_retry_if(
            &self.retry,
            || self.renderer.query(selector),
            RendererError::is_recoverable,
        ))
        .await
    }

    /// Shallow nodes matching `selector` below `root`
    pub async fn query_within(
        &self,
        root: &RenderedNode,
        selector: &str,
    ) -> Result<Vec<RenderedNode>, RendererError> {
        self.cancellable(with_retry_if(
            &self.retry,
            || self.renderer.query_within(root, selector),
            RendererError::is_recoverable,
        ))
        .await
    }

    /// Materialize the full subtree of `node`
    pub async fn expand(&self, node: &RenderedNode) -> Result<RenderedNode, RendererError> {
        self.expand_to(node, Depth::Unbounded).await
    }

    pub async fn expand_to(
        &self,
        node: &RenderedNode,
        depth: Depth,
    ) -> Result<RenderedNode, RendererError> {
        self.cancellable(with_retry_if(
            &self.retry,
            || self.renderer.expand(node, depth),
            RendererError::is_recoverable,
        ))
        .await
    }

    /// Full-page capture; never retried
    pub async fn screenshot(&self) -> Result<Vec<u8>, RendererError> {
        self.cancellable(self.renderer.screenshot()).await
    }

    async fn cancellable<T, F>(&self, call: F) -> Result<T, RendererError>
    where
        F: Future<Output = Result<T, RendererError>>,
    {
        if self.is_cancelled() {
            return Err(RendererError::Cancelled);
        }
        let shutdown = self.shutdown.clone();
        tokio::select! {
            result = call => result,
            () = shutdown_signalled(shutdown) => Err(RendererError::Cancelled),
        }
    }
}

/// Resolves once `true` is sent; never resolves if the sender is dropped first
async fn shutdown_signalled(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
