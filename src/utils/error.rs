//! Error types for the tdcrawl crawler
//!
//! This module defines the domain errors raised by the renderer boundary and by
//! the extraction stages.

use thiserror::Error;

use crate::dom::NodeHandle;

/// Errors raised by a [`Renderer`](crate::renderer::Renderer) call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendererError {
    /// The browser could not be started or a page could not be opened
    #[error("Renderer launch failed: {0}")]
    Launch(String),

    /// Navigation to a URL failed
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// A selector query against the current document failed
    #[error("Query '{selector}' failed: {reason}")]
    Query { selector: String, reason: String },

    /// Deep expansion of a node failed
    #[error("Expansion of node {node} failed: {reason}")]
    Expansion { node: NodeHandle, reason: String },

    /// The node belongs to a document that is no longer loaded
    #[error("Stale node reference: {node}")]
    StaleNode { node: NodeHandle },

    /// Screenshot capture failed
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// A renderer call did not finish in time
    #[error("Renderer call timed out after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The run was interrupted while the call was in flight
    #[error("Renderer call cancelled")]
    Cancelled,
}

impl RendererError {
    /// Whether retrying the same call may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. } | Self::Query { .. } | Self::Timeout { .. }
        )
    }
}

/// Errors that can occur while extracting data from a rendered tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The title selector did not resolve to exactly one node
    #[error("Expected exactly one title node, found {found}")]
    TitleResolution { found: usize },

    /// A listing card id did not carry a decimal identifier
    #[error("Invalid item identifier: {raw:?}")]
    IdentifierParse { raw: String },
}
