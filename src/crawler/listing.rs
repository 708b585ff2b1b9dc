//! Item enumeration over category listings
//!
//! A listing is requested as one oversized page, its cards are read after the
//! page settles and every card with a parseable `id` is merged into the
//! [`ItemIndex`] under its numeric identifier.

use tracing::{debug, info, warn};

use crate::config::{CategoryScope, SiteConfig};
use crate::dom::RenderedNode;
use crate::error::{Error, JoinedError};
use crate::models::{CategoryLink, ItemIdentifier, ItemIndex, RunStats};
use crate::renderer::{RenderSession, Renderer};
use crate::utils::error::RendererError;
use crate::utils::{append_param, resolve_link};

/// URL of the single-page listing for a category link
pub fn listing_url(site: &SiteConfig, link: &CategoryLink) -> String {
    let base = if link.as_str().is_empty() {
        String::new()
    } else {
        resolve_link(&site.root_url, link.as_str())
    };
    append_param(&base, &site.page_size_param)
}

/// Visit the category listings and merge their cards into `index`
///
/// With [`CategoryScope::First`] only the first link is visited, whatever
/// its outcome. A failed category is reported with its URL and never rolls
/// back cards already merged.
pub async fn enumerate_items<R: Renderer + ?Sized>(
    session: &RenderSession<'_, R>,
    site: &SiteConfig,
    scope: CategoryScope,
    links: &[CategoryLink],
    index: &mut ItemIndex,
    stats: &mut RunStats,
) -> JoinedError {
    let mut errors = JoinedError::new();

    for link in links {
        let url = listing_url(site, link);
        stats.categories_visited += 1;

        match visit_listing(session, site, &url, index, stats).await {
            Ok(()) => {}
            Err(RendererError::Cancelled) => break,
            Err(e) => {
                warn!(category = %url, error = %e, "Category listing failed");
                errors.push(Error::from(e).in_category(url));
            }
        }

        if scope == CategoryScope::First {
            debug!("Category scope is 'first', skipping remaining categories");
            break;
        }
    }

    errors
}

async fn visit_listing<R: Renderer + ?Sized>(
    session: &RenderSession<'_, R>,
    site: &SiteConfig,
    url: &str,
    index: &mut ItemIndex,
    stats: &mut RunStats,
) -> Result<(), RendererError> {
    session.navigate(url).await?;
    session.settle(&site.card_selector).await?;
    let cards = session.query(&site.card_selector).await?;

    let merged = merge_cards(cards, &site.card_id_prefix, index, stats);
    info!(
        category = %url,
        cards = merged,
        total = index.len(),
        "Category listing merged"
    );
    Ok(())
}

/// Merge cards into `index`, skipping those without a parseable identifier
///
/// Returns the number of cards merged.
pub fn merge_cards(
    cards: Vec<RenderedNode>,
    prefix: &str,
    index: &mut ItemIndex,
    stats: &mut RunStats,
) -> usize {
    let mut merged = 0;

    for card in cards {
        stats.cards_seen += 1;

        let Some(raw) = card.attribute("id") else {
            debug!(node = %card.handle, "Card without id skipped");
            stats.cards_skipped += 1;
            continue;
        };

        match ItemIdentifier::parse_card_id(raw, prefix) {
            Ok(identifier) => {
                if !index.insert(identifier, card) {
                    debug!(identifier = %identifier, "Card replaced an earlier one");
                }
                merged += 1;
            }
            Err(e) => {
                debug!(error = %e, "Card skipped");
                stats.cards_skipped += 1;
            }
        }
    }

    merged
}
