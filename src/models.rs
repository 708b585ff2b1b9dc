// Core data structures for the tdcrawl crawler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dom::RenderedNode;
use crate::utils::error::ExtractError;

/// Numeric key of a catalog item, parsed from a listing card id
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemIdentifier(u64);

impl ItemIdentifier {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Parse a card `id` attribute such as `MASTER70074`
    ///
    /// The prefix is stripped when present; the remainder must be a non-empty
    /// run of ASCII digits. Ids without the prefix are parsed as-is and
    /// therefore fail unless they are purely numeric.
    pub fn parse_card_id(raw: &str, prefix: &str) -> Result<Self, ExtractError> {
        let digits = raw.strip_prefix(prefix).unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ExtractError::IdentifierParse {
                raw: raw.to_string(),
            });
        }
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ExtractError::IdentifierParse {
                raw: raw.to_string(),
            })
    }
}

impl fmt::Display for ItemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// URL of one category listing, as found in the navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryLink(String);

impl CategoryLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self(href.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracted data of one catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub identifier: ItemIdentifier,
    pub name: String,
}

impl ItemRecord {
    pub fn new(identifier: ItemIdentifier, name: impl Into<String>) -> Self {
        Self {
            identifier,
            name: name.into(),
        }
    }
}

/// Identifier → record map accumulated over a run
///
/// Grows monotonically: there is no removal, and records with an empty name
/// are refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    records: BTreeMap<ItemIdentifier, ItemRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for its identifier
    ///
    /// Returns `false` (and stores nothing) when the name is blank.
    pub fn insert(&mut self, record: ItemRecord) -> bool {
        if record.name.trim().is_empty() {
            return false;
        }
        self.records.insert(record.identifier, record);
        true
    }

    pub fn get(&self, identifier: ItemIdentifier) -> Option<&ItemRecord> {
        self.records.get(&identifier)
    }

    pub fn contains(&self, identifier: ItemIdentifier) -> bool {
        self.records.contains_key(&identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending identifier order
    pub fn iter(&self) -> impl Iterator<Item = &ItemRecord> {
        self.records.values()
    }
}

/// Identifier → listing card map filled by the item enumerator
///
/// A card seen again under the same identifier replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    cards: BTreeMap<ItemIdentifier, RenderedNode>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a card; returns `true` if the identifier was new
    pub fn insert(&mut self, identifier: ItemIdentifier, card: RenderedNode) -> bool {
        self.cards.insert(identifier, card).is_none()
    }

    pub fn get(&self, identifier: ItemIdentifier) -> Option<&RenderedNode> {
        self.cards.get(&identifier)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Identifiers in ascending order
    pub fn identifiers(&self) -> Vec<ItemIdentifier> {
        self.cards.keys().copied().collect()
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Category links discovered in the navigation tree
    pub categories: u64,
    /// Category listings actually visited
    pub categories_visited: u64,
    /// Listing cards returned by the card selector
    pub cards_seen: u64,
    /// Cards without a usable identifier
    pub cards_skipped: u64,
    /// Detail pages visited
    pub items_visited: u64,
    /// Records added to the result set
    pub records: u64,
    /// Detail pages whose title did not resolve to a single node
    pub title_failures: u64,
    /// Detail pages that failed at the renderer
    pub item_failures: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration in seconds, once finished
    pub fn elapsed_secs(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}
