//! ============================================================================
//! Shop Snapshot Builder - raw store payloads into resolved snapshots
//! ============================================================================
//! Consumes `store/shop_pieces` updates, drops literal duplicates, maps slot
//! labels onto positions 1..=5 and resolves every named occupant to a cost
//! tier. A snapshot is replaced wholesale on every accepted payload.
//! ============================================================================

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{resolve_cost, Catalog, FallbackTable};
use crate::types::{
    EntityRef, Occupant, RawFeatureUpdate, ShopSnapshot, ShopwatchError, SlotEntry,
    SHOP_SLOT_COUNT, SOLD_SENTINEL,
};

/// Result of offering one update to the builder
#[derive(Debug, Clone, PartialEq)]
pub enum ShopOutcome {
    /// Not a shop payload
    Ignored,
    /// Byte-identical to the previous payload
    Duplicate,
    /// Malformed payload; the previous snapshot is retained
    ParseFailed(ShopwatchError),
    /// At least one slot holds an entity
    Updated(ShopSnapshot),
    /// Every slot is sold or absent
    Empty(ShopSnapshot),
}

/// Map a slot label onto a 1-based position.
/// Accepts `shop_N`, `store_N`, `slot_N` and any other `*_N` label.
pub fn slot_index_from_key(key: &str) -> Option<u8> {
    let (_, digits) = key.rsplit_once('_')?;
    let index: u8 = digits.trim().parse().ok()?;
    (1..=SHOP_SLOT_COUNT as u8).contains(&index).then_some(index)
}

#[derive(Debug, Default)]
pub struct ShopSnapshotBuilder {
    last_fingerprint: Option<String>,
    current: Option<ShopSnapshot>,
}

impl ShopSnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_relevant(update: &RawFeatureUpdate) -> bool {
        update.is_shop_pieces()
    }

    /// True when `raw` equals the last payload that passed the gate
    pub fn is_duplicate(&self, raw: &str) -> bool {
        self.last_fingerprint.as_deref() == Some(raw)
    }

    /// Offer an update. Duplicates are checked before parsing, and the
    /// fingerprint is recorded even if the payload then fails to parse.
    pub fn accept(
        &mut self,
        update: &RawFeatureUpdate,
        catalog: &Catalog,
        fallback: &FallbackTable,
    ) -> ShopOutcome {
        if !Self::is_relevant(update) {
            return ShopOutcome::Ignored;
        }
        if self.is_duplicate(&update.value) {
            debug!("Duplicate shop payload, skipping");
            return ShopOutcome::Duplicate;
        }
        self.last_fingerprint = Some(update.value.clone());

        let slots = match parse_slots(&update.value, catalog, fallback) {
            Ok(slots) => slots,
            Err(e) => {
                warn!("{}", e);
                return ShopOutcome::ParseFailed(e);
            }
        };

        let snapshot = ShopSnapshot {
            slots,
            raw_fingerprint: update.value.clone(),
            captured_at: Utc::now(),
        };
        self.current = Some(snapshot.clone());

        if snapshot.has_occupants() {
            debug!("Shop updated: {} occupied slots", snapshot.entities().count());
            ShopOutcome::Updated(snapshot)
        } else {
            debug!("Shop has no champions");
            ShopOutcome::Empty(snapshot)
        }
    }

    pub fn current(&self) -> Option<&ShopSnapshot> {
        self.current.as_ref()
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// Forget the fingerprint and the held snapshot (game exit)
    pub fn reset(&mut self) {
        self.last_fingerprint = None;
        self.current = None;
    }
}

fn parse_slots(
    raw: &str,
    catalog: &Catalog,
    fallback: &FallbackTable,
) -> Result<[SlotEntry; SHOP_SLOT_COUNT], ShopwatchError> {
    let document: Value =
        serde_json::from_str(raw).map_err(|e| ShopwatchError::PayloadParse(e.to_string()))?;
    let object = document.as_object().ok_or_else(|| {
        ShopwatchError::PayloadParse("expected an object of slot labels".to_string())
    })?;

    let mut slots: [SlotEntry; SHOP_SLOT_COUNT] =
        std::array::from_fn(|i| SlotEntry::empty(i as u8 + 1));

    for (label, data) in object {
        let Some(index) = slot_index_from_key(label) else {
            debug!("Ignoring unrecognized shop slot label: {}", label);
            continue;
        };
        // Slots without a name field carry nothing to show
        let Some(name) = data.as_object().and_then(|slot| slot.get("name")) else {
            continue;
        };

        let name = name.as_str().unwrap_or_default().trim();
        let occupant = if name.is_empty() || name == SOLD_SENTINEL {
            Occupant::Sold
        } else {
            Occupant::Entity(EntityRef {
                id: name.to_string(),
                cost_tier: resolve_cost(name, catalog, fallback),
            })
        };
        slots[usize::from(index) - 1].occupant = occupant;
    }

    Ok(slots)
}
