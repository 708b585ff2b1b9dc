//! Category enumeration over the navigation tree
//!
//! Each navigation entry (one alphabetic grouping) is deep-expanded and every
//! child below it yields one category link from its `href`. Links are kept in
//! document order, unfiltered and undeduplicated: a child without an `href`,
//! text included, yields an empty link.

use tracing::{debug, info, warn};

use crate::dom::RenderedNode;
use crate::error::JoinedError;
use crate::models::CategoryLink;
use crate::renderer::{RenderSession, Renderer};
use crate::utils::error::RendererError;

/// Collect the category links below `entries`
///
/// Every entry is attempted. Expansion failures are joined into the returned
/// error while the links gathered from the other entries are kept. An
/// interruption stops the walk without being reported as a failure.
pub async fn enumerate_categories<R: Renderer + ?Sized>(
    session: &RenderSession<'_, R>,
    entries: &[RenderedNode],
) -> (Vec<CategoryLink>, JoinedError) {
    let mut links = Vec::new();
    let mut errors = JoinedError::new();

    for entry in entries {
        let expanded = match session.expand(entry).await {
            Ok(expanded) => expanded,
            Err(RendererError::Cancelled) => break,
            Err(e) => {
                warn!(node = %entry.handle, error = %e, "Failed to expand navigation entry");
                errors.push(e);
                continue;
            }
        };

        let before = links.len();
        links.extend(entry_links(&expanded));
        debug!(
            node = %entry.handle,
            links = links.len() - before,
            "Navigation entry expanded"
        );
    }

    info!(
        entries = entries.len(),
        categories = links.len(),
        failed = errors.len(),
        "Category links discovered"
    );

    (links, errors)
}

/// `href` of every child of an expanded entry; missing hrefs yield empty
/// links
pub fn entry_links(entry: &RenderedNode) -> Vec<CategoryLink> {
    entry
        .known_children()
        .unwrap_or_default()
        .iter()
        .map(|child| CategoryLink::new(child.attribute("href").unwrap_or_default()))
        .collect()
}
