//! Offline renderer over static HTML documents
//!
//! Pages are registered up front as URL → HTML. Each navigation loads one of
//! them; queries run real CSS selectors through `scraper`. Whitespace-only
//! text nodes are dropped, as the DevTools DOM domain does, so trees built
//! from indented fixtures match what a browser reports.
//!
//! Node handles are pre-order positions in the parsed document, tagged with
//! the navigation generation.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::Renderer;
use crate::dom::{Depth, NodeHandle, NodeKind, RenderedNode};
use crate::utils::error::RendererError;

struct LoadedPage {
    html: String,
    generation: u64,
}

/// Renderer serving registered HTML documents
#[derive(Default)]
pub struct HtmlRenderer {
    pages: HashMap<String, String>,
    current: Mutex<Option<LoadedPage>>,
    generation: AtomicU64,
    visits: Mutex<Vec<String>>,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the document served at `url`
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn add_page(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    /// Every URL passed to `navigate`, in order, including failed ones
    pub async fn visits(&self) -> Vec<String> {
        self.visits.lock().await.clone()
    }
}

#[async_trait]
impl Renderer for HtmlRenderer {
    async fn navigate(&self, url: &str) -> Result<(), RendererError> {
        self.visits.lock().await.push(url.to_string());

        let html = self
            .pages
            .get(url)
            .ok_or_else(|| RendererError::Navigation {
                url: url.to_string(),
                reason: "no document registered for URL".to_string(),
            })?
            .clone();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.lock().await = Some(LoadedPage { html, generation });
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Vec<RenderedNode>, RendererError> {
        let parsed = parse_selector(selector)?;

        let current = self.current.lock().await;
        let page = current.as_ref().ok_or_else(|| RendererError::Query {
            selector: selector.to_string(),
            reason: "no document loaded".to_string(),
        })?;

        Ok(select_nodes(&page.html, &parsed, page.generation))
    }

    async fn query_within(
        &self,
        root: &RenderedNode,
        selector: &str,
    ) -> Result<Vec<RenderedNode>, RendererError> {
        let parsed = parse_selector(selector)?;

        let current = self.current.lock().await;
        let page = match current.as_ref() {
            Some(page) if page.generation == root.handle.generation() => page,
            _ => return Err(RendererError::StaleNode { node: root.handle }),
        };

        usize::try_from(root.handle.id())
            .ok()
            .and_then(|scope| select_within(&page.html, &parsed, scope, page.generation))
            .ok_or_else(|| RendererError::Query {
                selector: selector.to_string(),
                reason: format!("node {} is not an element of the document", root.handle),
            })
    }

    async fn expand(
        &self,
        node: &RenderedNode,
        depth: Depth,
    ) -> Result<RenderedNode, RendererError> {
        let current = self.current.lock().await;
        let page = match current.as_ref() {
            Some(page) if page.generation == node.handle.generation() => page,
            _ => return Err(RendererError::StaleNode { node: node.handle }),
        };

        expand_node(&page.html, node.handle, depth).ok_or_else(|| RendererError::Expansion {
            node: node.handle,
            reason: "node not found in document".to_string(),
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, RendererError> {
        Err(RendererError::Screenshot(
            "static documents cannot be rasterized".to_string(),
        ))
    }
}

/// Parsed document flattened into pre-order positions
struct FlatNode {
    kind: NodeKind,
    value: String,
    attributes: Vec<(String, String)>,
    /// Positions of children, whitespace-only text excluded
    children: Vec<usize>,
}

fn parse_selector(selector: &str) -> Result<Selector, RendererError> {
    Selector::parse(selector).map_err(|e| RendererError::Query {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Flatten `html`; also returns the positions matched by `selector`
///
/// With a `scope`, only descendants of the element at that position are
/// matched; the matches are `None` when no element sits there.
fn flatten(
    html: &str,
    selector: Option<&Selector>,
    scope: Option<usize>,
) -> (Vec<FlatNode>, Option<Vec<usize>>) {
    let document = Html::parse_document(html);
    let positions: HashMap<_, usize> = document
        .tree
        .root()
        .descendants()
        .enumerate()
        .map(|(position, node)| (node.id(), position))
        .collect();

    let nodes = document
        .tree
        .root()
        .descendants()
        .map(|node| {
            let (kind, value, attributes) = match node.value() {
                Node::Element(element) => (
                    NodeKind::Element(element.name().to_ascii_uppercase()),
                    String::new(),
                    element
                        .attrs()
                        .map(|(name, value)| (name.to_string(), value.to_string()))
                        .collect(),
                ),
                Node::Text(text) => (NodeKind::Text, String::from(&**text), Vec::new()),
                Node::Comment(comment) => {
                    (NodeKind::Comment, String::from(&**comment), Vec::new())
                }
                Node::Document => (NodeKind::Document, String::new(), Vec::new()),
                _ => (NodeKind::Other("#other".to_string()), String::new(), Vec::new()),
            };
            let children = node
                .children()
                .filter(|child| !matches!(child.value(), Node::Text(text) if text.trim().is_empty()))
                .filter_map(|child| positions.get(&child.id()).copied())
                .collect();
            FlatNode {
                kind,
                value,
                attributes,
                children,
            }
        })
        .collect();

    let matched = match (selector, scope) {
        (None, _) => Some(Vec::new()),
        (Some(selector), None) => Some(
            document
                .select(selector)
                .filter_map(|element| positions.get(&element.id()).copied())
                .collect(),
        ),
        (Some(selector), Some(scope)) => document
            .tree
            .root()
            .descendants()
            .nth(scope)
            .and_then(ElementRef::wrap)
            .map(|root| {
                root.select(selector)
                    .filter_map(|element| positions.get(&element.id()).copied())
                    .collect()
            }),
    };

    (nodes, matched)
}

fn select_nodes(html: &str, selector: &Selector, generation: u64) -> Vec<RenderedNode> {
    let (nodes, matched) = flatten(html, Some(selector), None);
    matched
        .unwrap_or_default()
        .into_iter()
        .map(|position| build(&nodes, position, generation, None))
        .collect()
}

fn select_within(
    html: &str,
    selector: &Selector,
    scope: usize,
    generation: u64,
) -> Option<Vec<RenderedNode>> {
    let (nodes, matched) = flatten(html, Some(selector), Some(scope));
    Some(
        matched?
            .into_iter()
            .map(|position| build(&nodes, position, generation, None))
            .collect(),
    )
}

fn expand_node(html: &str, handle: NodeHandle, depth: Depth) -> Option<RenderedNode> {
    let (nodes, _) = flatten(html, None, None);
    let position = usize::try_from(handle.id()).ok()?;
    if position >= nodes.len() {
        return None;
    }
    Some(build(&nodes, position, handle.generation(), Some(depth)))
}

/// Build the node at `position`; `depth = None` yields a shallow node
fn build(nodes: &[FlatNode], position: usize, generation: u64, depth: Option<Depth>) -> RenderedNode {
    let flat = &nodes[position];
    let child_count = flat.children.len();
    let descend = depth.filter(|depth| *depth != Depth::Levels(0));

    let children = match descend {
        Some(depth) => flat
            .children
            .iter()
            .map(|&child| build(nodes, child, generation, depth.descend()))
            .collect(),
        None => Vec::new(),
    };

    RenderedNode {
        handle: NodeHandle::new(generation, position as i64),
        kind: flat.kind.clone(),
        value: flat.value.clone(),
        attributes: flat.attributes.clone(),
        children,
        child_count,
        expanded: descend.is_some() || child_count == 0,
    }
}
