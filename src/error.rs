//! Unified error handling for the tdcrawl crate
//!
//! This module consolidates the domain-specific errors into a single `Error`
//! enum and provides [`JoinedError`], the ordered error collection the crawl
//! stages use to report partial failures without aborting.
//!
//! # Architecture
//!
//! - [`CrawlErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//! - [`JoinedError`] - Flattened list of errors gathered across a stage or run

use std::fmt;
use std::io;
use thiserror::Error;

use crate::models::ItemIdentifier;

// Re-export domain-specific errors for convenience
pub use crate::utils::error::{ExtractError, RendererError};

/// Common trait for all tdcrawl error types
pub trait CrawlErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Navigation, query, expansion and capture failures
    Renderer,
    /// Data extraction failures
    Extraction,
    /// Output and I/O errors
    Storage,
    /// The run was interrupted
    Cancelled,
}

impl ErrorCategory {
    /// Short lowercase name, used as a structured log field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renderer => "renderer",
            Self::Extraction => "extraction",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the tdcrawl crate
#[derive(Error, Debug)]
pub enum Error {
    /// Renderer boundary errors
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),

    /// Extraction errors
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Failure while processing one category listing
    #[error("Category {url}: {source}")]
    Category {
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// Failure while processing one catalog item
    #[error("Item {identifier}: {source}")]
    Item {
        identifier: ItemIdentifier,
        #[source]
        source: Box<Error>,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlErrorTrait for RendererError {
    fn is_recoverable(&self) -> bool {
        RendererError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Renderer,
        }
    }
}

impl CrawlErrorTrait for ExtractError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Extraction
    }
}

impl CrawlErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Renderer(e) => e.is_recoverable(),
            Self::Extract(e) => CrawlErrorTrait::is_recoverable(e),
            Self::Category { source, .. } | Self::Item { source, .. } => source.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Renderer(e) => e.category(),
            Self::Extract(e) => e.category(),
            Self::Category { source, .. } | Self::Item { source, .. } => source.category(),
            Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,
        }
    }
}

impl Error {
    /// Attach the category URL this error was raised for
    pub fn in_category(self, url: impl Into<String>) -> Self {
        Self::Category {
            url: url.into(),
            source: Box::new(self),
        }
    }

    /// Attach the catalog item this error was raised for
    pub fn for_item(self, identifier: ItemIdentifier) -> Self {
        Self::Item {
            identifier,
            source: Box::new(self),
        }
    }
}

/// Ordered collection of errors gathered without aborting
///
/// Joining never drops an error and nested collections are flattened, so the
/// identity of each failure (category URL, item identifier, node) survives up
/// to the process boundary.
#[derive(Debug, Default)]
pub struct JoinedError {
    errors: Vec<Error>,
}

impl JoinedError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one error
    pub fn push(&mut self, error: impl Into<Error>) {
        self.errors.push(error.into());
    }

    /// Append every error of another collection, preserving order
    pub fn join(&mut self, other: JoinedError) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> std::result::Result<(), JoinedError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for JoinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.errors.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedError {}

impl From<Error> for JoinedError {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for JoinedError {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
