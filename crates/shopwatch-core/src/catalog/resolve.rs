//! ============================================================================
//! Identifier Resolution - raw shop id → cost tier
//! ============================================================================
//! Strategies, first match wins:
//! 1. Exact id in the live catalog
//! 2. Exact id in the bundled fallback table
//! 3. Set prefix swapped for the current one, exact match in the fallback
//! 4. Fuzzy bare-name containment against the fallback (sorted key order)
//! 5. Unresolved → `CostTier::Unknown`
//! ============================================================================

use tracing::{debug, warn};

use super::fallback::FallbackTable;
use super::source::Catalog;
use crate::types::CostTier;

/// Bare names this short or shorter never take part in fuzzy matching
const MIN_FUZZY_NAME_LEN: usize = 2;

/// Which strategy produced a tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPath {
    LiveCatalog,
    Fallback,
    Reprefixed(String),
    Fuzzy(String),
    Unresolved,
}

/// Resolve `raw_id` to a cost tier. Never fails; unknown ids yield `"?"`.
pub fn resolve_cost(raw_id: &str, catalog: &Catalog, fallback: &FallbackTable) -> CostTier {
    resolve_cost_traced(raw_id, catalog, fallback).0
}

/// Like [`resolve_cost`], also reporting which strategy matched
pub fn resolve_cost_traced(
    raw_id: &str,
    catalog: &Catalog,
    fallback: &FallbackTable,
) -> (CostTier, ResolutionPath) {
    if let Some(entry) = catalog.get(raw_id) {
        return (CostTier::Known(entry.cost), ResolutionPath::LiveCatalog);
    }

    if let Some(cost) = fallback.get(raw_id) {
        return (CostTier::Known(cost), ResolutionPath::Fallback);
    }

    let base = strip_set_prefix(raw_id);
    let reprefixed = format!("{}{}", catalog.set_prefix(), base);
    if let Some(cost) = fallback.get(&reprefixed) {
        debug!("Resolved {} via set prefix as {}", raw_id, reprefixed);
        return (CostTier::Known(cost), ResolutionPath::Reprefixed(reprefixed));
    }

    let needle = normalize_token(base);
    if !needle.is_empty() {
        for (key, cost) in fallback.iter() {
            let bare = normalize_token(bare_name(key));
            if bare.len() > MIN_FUZZY_NAME_LEN && needle.contains(&bare) {
                debug!("Resolved {} by fuzzy match on {}", raw_id, key);
                return (CostTier::Known(cost), ResolutionPath::Fuzzy(key.to_string()));
            }
        }
    }

    warn!("Unknown champion: {}", raw_id);
    (CostTier::Unknown, ResolutionPath::Unresolved)
}

/// Strip a leading `TFT<digits>_` token: `"TFT16_Jhin"` → `"Jhin"`.
/// Ids without a set prefix come back unchanged.
pub fn strip_set_prefix(id: &str) -> &str {
    let Some(rest) = id.strip_prefix("TFT") else {
        return id;
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return id;
    }
    rest[digits..].strip_prefix('_').unwrap_or(id)
}

/// Name after the last `_` separator: `"TFT16_Kog'Maw"` → `"Kog'Maw"`
pub fn bare_name(id: &str) -> &str {
    id.rsplit('_').next().unwrap_or(id)
}

/// Lowercase and drop everything that is not alphanumeric, so `"Kog'Maw"`
/// and `"KogMaw"` compare equal
pub fn normalize_token(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Prefix for a content set number: `16` → `"TFT16_"`
pub fn set_prefix(set_number: u32) -> String {
    format!("TFT{}_", set_number)
}
