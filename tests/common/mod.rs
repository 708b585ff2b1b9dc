//! Common test utilities
//!
//! [`SiteBuilder`] lays out a miniature test directory (navigation page,
//! category listings, detail pages) served by the offline `HtmlRenderer`.
//! [`ScriptedRenderer`] wraps any renderer to inject failures, interrupts and
//! fake screenshots.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

use tdcrawl::config::{Config, RetryConfig, SettleConfig};
use tdcrawl::crawler::{Pipeline, RunReport};
use tdcrawl::dom::{Depth, NodeHandle, RenderedNode};
use tdcrawl::models::{ItemRecord, ResultSet};
use tdcrawl::renderer::{HtmlRenderer, RenderSession, Renderer};
use tdcrawl::utils::error::RendererError;

pub const ROOT_URL: &str = "https://directory.test/test-directory";
pub const DETAIL_TEMPLATE: &str = "https://directory.test/test/test-detail/{id}/item?p=r&q=*";
pub const PAGE_SIZE_PARAM: &str = "rows=4000";

// ============================================================================
// Fixture site
// ============================================================================

/// Listing URL requested for a category href
pub fn listing_url(href: &str) -> String {
    format!("https://directory.test{href}&{PAGE_SIZE_PARAM}")
}

pub fn detail_url(id: u64) -> String {
    DETAIL_TEMPLATE.replace("{id}", &id.to_string())
}

/// Detail page whose title holds an icon element followed by the name
pub fn detail_page(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body>
  <header>
    <h1 class="qd-header__title-mobile ng-binding">
      <i class="material-icons">science</i>
      {name}
    </h1>
  </header>
  <section class="test-detail">Specimen requirements</section>
</body>
</html>"#
    )
}

/// Detail page with `count` title elements
pub fn detail_page_with_titles(count: usize) -> String {
    let titles: String = (0..count)
        .map(|i| format!(r#"<h1 class="qd-header__title-mobile ng-binding">Title {i}</h1>"#))
        .collect();
    format!("<html><body>{titles}</body></html>")
}

/// Miniature directory: one navigation entry per category
#[derive(Default)]
pub struct SiteBuilder {
    categories: Vec<(String, Vec<String>)>,
    details: Vec<(u64, String)>,
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Category at `href` whose listing renders cards with these `id`s
    pub fn category(mut self, href: &str, card_ids: &[&str]) -> Self {
        self.categories.push((
            href.to_string(),
            card_ids.iter().map(|id| id.to_string()).collect(),
        ));
        self
    }

    /// Standard detail page for `id`
    pub fn item(self, id: u64, name: &str) -> Self {
        self.detail(id, detail_page(name))
    }

    /// Detail page for `id` with custom markup
    pub fn detail(mut self, id: u64, html: String) -> Self {
        self.details.push((id, html));
        self
    }

    pub fn root_page(&self) -> String {
        let entries: String = self
            .categories
            .iter()
            .map(|(href, _)| {
                format!("\n          <li>\n            <a href=\"{href}\">{href}</a>\n          </li>")
            })
            .collect();
        format!(
            r#"<!DOCTYPE html>
<html>
<body>
  <div id="a2zContainer">
    <div class="component-body-area">
      <div class="a2z-area">
        <ul>{entries}
        </ul>
      </div>
    </div>
  </div>
</body>
</html>"#
        )
    }

    pub fn build(self) -> HtmlRenderer {
        let mut renderer = HtmlRenderer::new();
        renderer.add_page(ROOT_URL, self.root_page());

        for (href, card_ids) in &self.categories {
            let cards: String = card_ids
                .iter()
                .map(|id| {
                    if id.is_empty() {
                        "\n    <md-card><h3>No id</h3></md-card>".to_string()
                    } else {
                        format!("\n    <md-card id=\"{id}\"><h3>{id}</h3></md-card>")
                    }
                })
                .collect();
            renderer.add_page(
                listing_url(href),
                format!("<html><body>\n  <div class=\"results\">{cards}\n  </div>\n</body></html>"),
            );
        }

        for (id, html) in self.details {
            renderer.add_page(detail_url(id), html);
        }
        renderer
    }
}

/// Two categories: `/a` with items 5 and 70074, `/b` with item 900
pub fn two_category_site() -> SiteBuilder {
    SiteBuilder::new()
        .category("/a", &["MASTER70074", "MASTER5", "MASTERxyz", ""])
        .category("/b", &["MASTER900"])
        .item(5, "Ferritin")
        .item(70074, "Complement Component C3c")
        .item(900, "Vitamin D, 25-Hydroxy")
}

/// Configuration pointing at the fixture site, without delays or retries
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.site.root_url = ROOT_URL.to_string();
    config.site.detail_url_template = DETAIL_TEMPLATE.to_string();
    config.site.page_size_param = PAGE_SIZE_PARAM.to_string();
    config.settle = SettleConfig::immediate();
    config.retry = RetryConfig::disabled();
    config.crawl.screenshot = false;
    config
}

// ============================================================================
// Running the pipeline
// ============================================================================

/// Outcome of one fixture crawl
pub struct Crawl {
    pub report: RunReport,
    pub results: ResultSet,
    pub emitted: Vec<ItemRecord>,
}

pub async fn crawl<R: Renderer + ?Sized>(renderer: &R, config: &Config) -> Crawl {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    crawl_with_shutdown(renderer, config, shutdown_rx).await
}

pub async fn crawl_with_shutdown<R: Renderer + ?Sized>(
    renderer: &R,
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Crawl {
    let session = RenderSession::new(
        renderer,
        config.retry.clone(),
        config.settle.clone(),
        shutdown,
    );
    let mut pipeline = Pipeline::new(&session, config);
    let mut emitted = Vec::new();
    let report = pipeline.run(&mut emitted).await;

    Crawl {
        report,
        results: pipeline.into_results(),
        emitted,
    }
}

// ============================================================================
// Scripted renderer
// ============================================================================

/// Interrupt raised when the `nth` navigation matching `pattern` starts
struct Interrupt {
    pattern: String,
    nth: usize,
    sender: watch::Sender<bool>,
}

/// Renderer wrapper with injected behavior
pub struct ScriptedRenderer<R> {
    inner: R,
    navigation_failures: Mutex<HashMap<String, usize>>,
    hidden_matches: Mutex<HashMap<String, usize>>,
    failing_expansions: HashSet<usize>,
    expansions: AtomicUsize,
    interrupt: Option<Interrupt>,
    matched_navigations: AtomicUsize,
    last_url: Mutex<Option<String>>,
    screenshots: bool,
}

impl<R: Renderer> ScriptedRenderer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            navigation_failures: Mutex::new(HashMap::new()),
            hidden_matches: Mutex::new(HashMap::new()),
            failing_expansions: HashSet::new(),
            expansions: AtomicUsize::new(0),
            interrupt: None,
            matched_navigations: AtomicUsize::new(0),
            last_url: Mutex::new(None),
            screenshots: false,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Fail the next `times` navigations to `url`
    pub fn fail_navigation(self, url: impl Into<String>, times: usize) -> Self {
        self.navigation_failures
            .lock()
            .unwrap()
            .insert(url.into(), times);
        self
    }

    /// Fail every navigation to `url`
    pub fn fail_navigation_always(self, url: impl Into<String>) -> Self {
        self.fail_navigation(url, usize::MAX)
    }

    /// Answer the first `calls` queries for `selector` with no matches, as
    /// if the nodes had not rendered yet
    pub fn reveal_after(self, selector: impl Into<String>, calls: usize) -> Self {
        self.hidden_matches
            .lock()
            .unwrap()
            .insert(selector.into(), calls);
        self
    }

    /// Fail the expand call with this 0-based ordinal
    pub fn fail_expansion(mut self, call: usize) -> Self {
        self.failing_expansions.insert(call);
        self
    }

    /// Signal shutdown when the `nth` (1-based) navigation to a URL
    /// containing `pattern` starts
    pub fn interrupt_on(
        mut self,
        pattern: impl Into<String>,
        nth: usize,
        sender: watch::Sender<bool>,
    ) -> Self {
        self.interrupt = Some(Interrupt {
            pattern: pattern.into(),
            nth,
            sender,
        });
        self
    }

    /// Answer screenshots with the bytes of the current URL
    pub fn with_screenshots(mut self) -> Self {
        self.screenshots = true;
        self
    }
}

#[async_trait]
impl<R: Renderer> Renderer for ScriptedRenderer<R> {
    async fn navigate(&self, url: &str) -> Result<(), RendererError> {
        *self.last_url.lock().unwrap() = Some(url.to_string());

        if let Some(interrupt) = &self.interrupt {
            if url.contains(&interrupt.pattern) {
                let seen = self.matched_navigations.fetch_add(1, Ordering::SeqCst) + 1;
                if seen == interrupt.nth {
                    let _ = interrupt.sender.send(true);
                }
            }
        }

        let should_fail = {
            let mut failures = self.navigation_failures.lock().unwrap();
            match failures.get_mut(url) {
                Some(remaining) if *remaining > 0 => {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(RendererError::Navigation {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }

        self.inner.navigate(url).await
    }

    async fn query(&self, selector: &str) -> Result<Vec<RenderedNode>, RendererError> {
        let hidden = {
            let mut hidden = self.hidden_matches.lock().unwrap();
            match hidden.get_mut(selector) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if hidden {
            return Ok(Vec::new());
        }
        self.inner.query(selector).await
    }

    async fn query_within(
        &self,
        root: &RenderedNode,
        selector: &str,
    ) -> Result<Vec<RenderedNode>, RendererError> {
        self.inner.query_within(root, selector).await
    }

    async fn expand(
        &self,
        node: &RenderedNode,
        depth: Depth,
    ) -> Result<RenderedNode, RendererError> {
        let call = self.expansions.fetch_add(1, Ordering::SeqCst);
        if self.failing_expansions.contains(&call) {
            return Err(RendererError::Expansion {
                node: node.handle,
                reason: "node detached".to_string(),
            });
        }
        self.inner.expand(node, depth).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, RendererError> {
        if !self.screenshots {
            return self.inner.screenshot().await;
        }
        let url = self.last_url.lock().unwrap().clone().unwrap_or_default();
        Ok(url.into_bytes())
    }
}

/// Handle helper for hand-built trees
pub fn handle(id: i64) -> NodeHandle {
    NodeHandle::new(1, id)
}
