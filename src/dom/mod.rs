//! In-memory model of a rendered document tree
//!
//! A [`RenderedNode`] is a read-only snapshot of what the renderer reported
//! for one node. Children are only materialized by an explicit expansion;
//! until then a node with a positive `child_count` has *unknown* children,
//! which [`RenderedNode::known_children`] reports as `None`.

pub mod printer;

pub use printer::TreePrinter;

use std::fmt;

use crate::utils::normalize_whitespace;

/// Opaque identity of a node inside one loaded document
///
/// `generation` counts navigations of the renderer that produced the node, so
/// a handle outlives its document only as a detectable stale reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    generation: u64,
    id: i64,
}

impl NodeHandle {
    #[must_use]
    pub fn new(generation: u64, id: i64) -> Self {
        Self { generation, id }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.id, self.generation)
    }
}

/// What a node is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with its tag name as reported by the renderer
    Element(String),
    /// Text node
    Text,
    Comment,
    Document,
    /// Any other node type, carrying the renderer's node name
    Other(String),
}

impl NodeKind {
    /// Tag or node name, in the marker form used by DOM inspectors
    pub fn name(&self) -> &str {
        match self {
            Self::Element(tag) => tag,
            Self::Text => "#text",
            Self::Comment => "#comment",
            Self::Document => "#document",
            Self::Other(name) => name,
        }
    }
}

/// Depth of a deep-expansion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    /// Materialize this many levels below the node
    Levels(u32),
    /// Materialize the entire subtree
    Unbounded,
}

impl Depth {
    /// Depth in the `-1 = entire subtree` convention of the DevTools protocol
    pub fn as_protocol(&self) -> i64 {
        match self {
            Self::Levels(levels) => i64::from(*levels),
            Self::Unbounded => -1,
        }
    }

    /// Depth left for the children of a node expanded at `self`
    pub fn descend(&self) -> Option<Depth> {
        match self {
            Self::Levels(0) => None,
            Self::Levels(levels) => Some(Self::Levels(levels - 1)),
            Self::Unbounded => Some(Self::Unbounded),
        }
    }
}

/// One node of a rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNode {
    pub handle: NodeHandle,
    pub kind: NodeKind,
    /// Node value (the text of a text node, empty for elements)
    pub value: String,
    /// Attribute name/value pairs in document order
    pub attributes: Vec<(String, String)>,
    /// Materialized children, meaningful only when `expanded` is set
    pub children: Vec<RenderedNode>,
    /// Number of children the renderer reports, independent of `children`
    pub child_count: usize,
    /// Whether `children` was populated by an expansion
    pub expanded: bool,
}

impl RenderedNode {
    /// Element node without attributes or children
    pub fn element(handle: NodeHandle, tag: impl Into<String>) -> Self {
        Self {
            handle,
            kind: NodeKind::Element(tag.into()),
            value: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
            child_count: 0,
            expanded: true,
        }
    }

    /// Text node
    pub fn text(handle: NodeHandle, value: impl Into<String>) -> Self {
        Self {
            handle,
            kind: NodeKind::Text,
            value: value.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            child_count: 0,
            expanded: true,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Replace the children and mark the node as expanded
    #[must_use]
    pub fn with_children(mut self, children: Vec<RenderedNode>) -> Self {
        self.child_count = children.len();
        self.children = children;
        self.expanded = true;
        self
    }

    /// Attribute value by name (names compare case-insensitively)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    /// Whether this is an element with the given tag, compared case-insensitively
    pub fn has_tag(&self, tag: &str) -> bool {
        match &self.kind {
            NodeKind::Element(name) => name.eq_ignore_ascii_case(tag),
            _ => false,
        }
    }

    /// Children, or `None` when the renderer reported children that were
    /// never materialized
    pub fn known_children(&self) -> Option<&[RenderedNode]> {
        if self.expanded || self.child_count == 0 {
            Some(&self.children)
        } else {
            None
        }
    }

    /// Text of this node's subtree with whitespace collapsed
    ///
    /// Only materialized descendants contribute.
    pub fn text_content(&self) -> String {
        let mut buffer = String::new();
        self.collect_text(&mut buffer);
        normalize_whitespace(&buffer)
    }

    fn collect_text(&self, buffer: &mut String) {
        if self.is_text() {
            buffer.push_str(&self.value);
            buffer.push(' ');
            return;
        }
        for child in &self.children {
            child.collect_text(buffer);
        }
    }
}
