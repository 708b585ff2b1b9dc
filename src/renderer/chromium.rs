//! Headless Chromium renderer over the DevTools protocol
//!
//! Node handles carry the DOM backend node id, which survives across DOM
//! agent resets within one document but not across navigations.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::{
    BackendNodeId, DescribeNodeParams, GetDocumentParams, Node,
    PushNodesByBackendIdsToFrontendParams, QuerySelectorAllParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Renderer;
use crate::config::RendererConfig;
use crate::dom::{Depth, NodeHandle, NodeKind, RenderedNode};
use crate::utils::error::RendererError;

const ELEMENT_NODE: i64 = 1;
const TEXT_NODE: i64 = 3;
const COMMENT_NODE: i64 = 8;
const DOCUMENT_NODE: i64 = 9;

/// Renderer driving one tab of a launched Chromium
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    generation: AtomicU64,
    request_timeout_ms: u64,
}

impl ChromiumRenderer {
    /// Launch Chromium and open a blank tab
    pub async fn launch(config: &RendererConfig) -> Result<Self, RendererError> {
        let timeout = config.request_timeout();

        let mut builder = BrowserConfig::builder().request_timeout(timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(RendererError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RendererError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RendererError::Launch(e.to_string()))?;

        info!(headless = config.headless, "Chromium launched");

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            generation: AtomicU64::new(0),
            request_timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// Close the browser and stop its event handler
    pub async fn close(self) {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Failed to close browser cleanly");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn timeout(&self, operation: impl Into<String>) -> RendererError {
        RendererError::Timeout {
            operation: operation.into(),
            timeout_ms: self.request_timeout_ms,
        }
    }

    fn query_failed(&self, selector: &str, error: CdpError) -> RendererError {
        match error {
            CdpError::Timeout => self.timeout(format!("query {selector}")),
            e => RendererError::Query {
                selector: selector.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn navigate(&self, url: &str) -> Result<(), RendererError> {
        // Bumped first: handles from the old document are invalid even if
        // the navigation fails halfway.
        self.generation.fetch_add(1, Ordering::SeqCst);

        match self.page.goto(url).await {
            Ok(_) => Ok(()),
            Err(CdpError::Timeout) => Err(self.timeout(format!("navigate {url}"))),
            Err(e) => Err(RendererError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn query(&self, selector: &str) -> Result<Vec<RenderedNode>, RendererError> {
        let generation = self.current_generation();
        let elements = match self.page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(CdpError::NotFound) => Vec::new(),
            Err(CdpError::Timeout) => return Err(self.timeout(format!("query {selector}"))),
            Err(e) => {
                return Err(RendererError::Query {
                    selector: selector.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let mut nodes = Vec::with_capacity(elements.len());
        for element in elements {
            let params = DescribeNodeParams::builder()
                .backend_node_id(element.backend_node_id)
                .depth(0)
                .build();
            let described = self
                .page
                .execute(params)
                .await
                .map_err(|e| RendererError::Query {
                    selector: selector.to_string(),
                    reason: e.to_string(),
                })?;
            nodes.push(convert(&described.result.node, generation, Depth::Levels(0)));
        }
        Ok(nodes)
    }

    async fn query_within(
        &self,
        root: &RenderedNode,
        selector: &str,
    ) -> Result<Vec<RenderedNode>, RendererError> {
        let generation = self.current_generation();
        if root.handle.generation() != generation {
            return Err(RendererError::StaleNode { node: root.handle });
        }

        // Backend ids only resolve to frontend ids once the document was requested
        self.page
            .execute(GetDocumentParams::default())
            .await
            .map_err(|e| self.query_failed(selector, e))?;

        let pushed = self
            .page
            .execute(PushNodesByBackendIdsToFrontendParams::new(vec![
                BackendNodeId::new(root.handle.id()),
            ]))
            .await
            .map_err(|_| RendererError::StaleNode { node: root.handle })?;
        let scope = match pushed.result.node_ids.into_iter().next() {
            Some(node_id) if *node_id.inner() != 0 => node_id,
            _ => return Err(RendererError::StaleNode { node: root.handle }),
        };

        let matched = self
            .page
            .execute(QuerySelectorAllParams::new(scope, selector))
            .await
            .map_err(|e| self.query_failed(selector, e))?;

        let mut nodes = Vec::with_capacity(matched.result.node_ids.len());
        for node_id in matched.result.node_ids {
            let params = DescribeNodeParams::builder()
                .node_id(node_id)
                .depth(0)
                .build();
            let described = self
                .page
                .execute(params)
                .await
                .map_err(|e| self.query_failed(selector, e))?;
            nodes.push(convert(&described.result.node, generation, Depth::Levels(0)));
        }
        Ok(nodes)
    }

    async fn count(&self, selector: &str) -> Result<usize, RendererError> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            Err(CdpError::NotFound) => Ok(0),
            Err(CdpError::Timeout) => Err(self.timeout(format!("count {selector}"))),
            Err(e) => Err(RendererError::Query {
                selector: selector.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn expand(
        &self,
        node: &RenderedNode,
        depth: Depth,
    ) -> Result<RenderedNode, RendererError> {
        let generation = self.current_generation();
        if node.handle.generation() != generation {
            return Err(RendererError::StaleNode { node: node.handle });
        }

        let params = DescribeNodeParams::builder()
            .backend_node_id(BackendNodeId::new(node.handle.id()))
            .depth(depth.as_protocol())
            .build();
        match self.page.execute(params).await {
            Ok(described) => Ok(convert(&described.result.node, generation, depth)),
            Err(CdpError::Timeout) => Err(self.timeout(format!("expand {}", node.handle))),
            Err(e) => Err(RendererError::Expansion {
                node: node.handle,
                reason: e.to_string(),
            }),
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, RendererError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| RendererError::Screenshot(e.to_string()))
    }
}

/// Convert a described DevTools node, keeping children down to `depth`
fn convert(node: &Node, generation: u64, depth: Depth) -> RenderedNode {
    let kind = match node.node_type {
        ELEMENT_NODE => NodeKind::Element(node.node_name.clone()),
        TEXT_NODE => NodeKind::Text,
        COMMENT_NODE => NodeKind::Comment,
        DOCUMENT_NODE => NodeKind::Document,
        _ => NodeKind::Other(node.node_name.clone()),
    };

    let attributes = node
        .attributes
        .as_deref()
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();

    let described = depth.descend().zip(node.children.as_ref());
    let children: Vec<RenderedNode> = match described {
        Some((next, children)) => children
            .iter()
            .map(|child| convert(child, generation, next))
            .collect(),
        None => Vec::new(),
    };

    let child_count = match described {
        Some(_) => children.len(),
        None => node
            .child_node_count
            .and_then(|count| usize::try_from(count).ok())
            .unwrap_or(0),
    };
    let expanded = described.is_some() || child_count == 0;

    RenderedNode {
        handle: NodeHandle::new(generation, *node.backend_node_id.inner()),
        kind,
        value: node.node_value.clone(),
        attributes,
        children,
        child_count,
        expanded,
    }
}
