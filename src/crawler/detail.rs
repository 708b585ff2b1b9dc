//! Item detail extraction
//!
//! For each identifier the detail page is rendered, the single title element
//! is deep-expanded and one of its children supplies the display name.
//!
//! Title problems only cost the item its record. Renderer failures are
//! handled per [`FailurePolicy`].

use tracing::{debug, info, warn};

use crate::config::{CrawlConfig, FailurePolicy, NameSource, SiteConfig};
use crate::dom::RenderedNode;
use crate::error::{Error, JoinedError};
use crate::models::{ItemIdentifier, ItemIndex, ItemRecord, ResultSet, RunStats};
use crate::renderer::{RenderSession, Renderer};
use crate::storage::RecordSink;
use crate::utils::error::{ExtractError, RendererError};
use crate::utils::normalize_whitespace;

// ============================================================================
// Name extraction
// ============================================================================

/// Pick the display name out of an expanded title node
///
/// Returns `None` when no child qualifies or the title's children were never
/// materialized.
pub fn extract_name(title: &RenderedNode, source: NameSource) -> Option<String> {
    let children = title.known_children()?;

    let name = match source {
        NameSource::FirstText => children
            .iter()
            .filter(|child| child.is_text())
            .map(|child| child.value.trim())
            .find(|value| !value.is_empty())
            .map(normalize_whitespace),
        NameSource::FirstElement => children
            .iter()
            .find(|child| child.is_element())
            .map(RenderedNode::text_content),
    }?;

    (!name.is_empty()).then_some(name)
}

// ============================================================================
// Single item
// ============================================================================

/// Result of visiting one detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A name was found
    Extracted(ItemRecord),
    /// The title resolved but carried no usable name
    Unnamed,
    /// The title selector did not match exactly one node
    TitleUnresolved(ExtractError),
}

/// A visited detail page
#[derive(Debug)]
pub struct DetailPage {
    pub outcome: ItemOutcome,
    /// Full-page capture, when requested and successful
    pub screenshot: Option<Vec<u8>>,
}

/// Render the detail page of `identifier` and extract its name
///
/// # Errors
///
/// Returns the renderer error of the navigation, title query or title
/// expansion. A failed capture is logged and only drops the screenshot.
pub async fn extract_item<R: Renderer + ?Sized>(
    session: &RenderSession<'_, R>,
    site: &SiteConfig,
    name_source: NameSource,
    capture: bool,
    identifier: ItemIdentifier,
) -> Result<DetailPage, RendererError> {
    let url = site.detail_url(identifier);
    debug!(identifier = %identifier, url = %url, "Visiting detail page");

    session.navigate(&url).await?;
    session.settle(&site.title_selector).await?;

    let screenshot = if capture {
        match session.screenshot().await {
            Ok(image) => Some(image),
            Err(RendererError::Cancelled) => return Err(RendererError::Cancelled),
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Screenshot failed");
                None
            }
        }
    } else {
        None
    };

    let titles = session.query(&site.title_selector).await?;
    let [title] = titles.as_slice() else {
        return Ok(DetailPage {
            outcome: ItemOutcome::TitleUnresolved(ExtractError::TitleResolution {
                found: titles.len(),
            }),
            screenshot,
        });
    };

    let title = session.expand(title).await?;
    let outcome = match extract_name(&title, name_source) {
        Some(name) => ItemOutcome::Extracted(ItemRecord::new(identifier, name)),
        None => ItemOutcome::Unnamed,
    };

    Ok(DetailPage {
        outcome,
        screenshot,
    })
}

// ============================================================================
// Stage
// ============================================================================

/// What the detail stage produced besides records
#[derive(Debug, Default)]
pub struct DetailSummary {
    pub errors: JoinedError,
    /// Last successful capture
    pub screenshot: Option<Vec<u8>>,
}

/// Extract every indexed item in ascending identifier order
///
/// At most `crawl.max_items` pages are visited. Each record is inserted into
/// `results` and then handed to `sink`. A sink failure ends the stage, as
/// does an interruption or, under [`FailurePolicy::Abort`], a renderer
/// failure.
pub async fn extract_details<R, S>(
    session: &RenderSession<'_, R>,
    site: &SiteConfig,
    crawl: &CrawlConfig,
    index: &ItemIndex,
    results: &mut ResultSet,
    stats: &mut RunStats,
    sink: &mut S,
) -> DetailSummary
where
    R: Renderer + ?Sized,
    S: RecordSink + ?Sized,
{
    let mut summary = DetailSummary::default();
    let limit = crawl.max_items.unwrap_or(usize::MAX);
    let identifiers = index.identifiers();

    info!(
        identifiers = identifiers.len(),
        limit = ?crawl.max_items,
        "Extracting item details"
    );

    for identifier in identifiers.into_iter().take(limit) {
        if session.is_cancelled() {
            break;
        }
        stats.items_visited += 1;

        let page = match extract_item(
            session,
            site,
            crawl.name_source,
            crawl.screenshot,
            identifier,
        )
        .await
        {
            Ok(page) => page,
            Err(RendererError::Cancelled) => break,
            Err(e) => {
                stats.item_failures += 1;
                warn!(identifier = %identifier, error = %e, "Detail page failed");
                summary.errors.push(Error::from(e).for_item(identifier));
                if crawl.failure_policy == FailurePolicy::Abort {
                    warn!("Failure policy is 'abort', skipping remaining items");
                    break;
                }
                continue;
            }
        };

        if page.screenshot.is_some() {
            summary.screenshot = page.screenshot;
        }

        match page.outcome {
            ItemOutcome::Extracted(record) => {
                debug!(identifier = %identifier, name = %record.name, "Item extracted");
                results.insert(record.clone());
                stats.records = results.len() as u64;
                if let Err(e) = sink.write_record(&record) {
                    summary.errors.push(e);
                    break;
                }
            }
            ItemOutcome::Unnamed => {
                debug!(identifier = %identifier, "Title carried no name, item omitted");
            }
            ItemOutcome::TitleUnresolved(e) => {
                stats.title_failures += 1;
                warn!(identifier = %identifier, error = %e, "Title not resolved, item omitted");
            }
        }
    }

    summary
}
