//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Resolve a possibly relative link against a base URL
///
/// Absolute links are returned unchanged; anything that cannot be resolved is
/// returned as-is so the failure surfaces at navigation time.
pub fn resolve_link(base: &str, link: &str) -> String {
    if Url::parse(link).is_ok() {
        return link.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(link))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| link.to_string())
}

/// Append a raw `key=value` parameter to a URL
///
/// The parameter is always joined with `&`: category links on the directory
/// already carry a query string.
pub fn append_param(url: &str, param: &str) -> String {
    if param.is_empty() {
        return url.to_string();
    }
    format!("{url}&{param}")
}
