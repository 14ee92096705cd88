//! ============================================================================
//! Core Types for Shopwatch
//! ============================================================================
//! Session, snapshot, catalog and render-model types shared by every stage of
//! the pipeline. These types are serialized to JSON for the replay format and
//! for the external renderer.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Numeric game identifier as reported by the event source
pub type GameId = u32;

/// Number of fixed shop positions in a round
pub const SHOP_SLOT_COUNT: usize = 5;

/// Feature name carrying shop contents
pub const STORE_FEATURE: &str = "store";

/// Key under the store feature holding the slot → piece JSON document
pub const SHOP_PIECES_KEY: &str = "shop_pieces";

/// Occupant name the game uses for a bought slot
pub const SOLD_SENTINEL: &str = "Sold";

// ============================================================================
// Session
// ============================================================================

/// Connection lifecycle of the tracked game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    /// Startup reconciliation is probing for an already-running game
    Detecting,
    Connected,
    /// The game runs elevated and the host does not; needs a manual restart
    ElevationBlocked,
}

/// Which games are tracked and which one (if any) is attached.
/// Invariant: `active_id.is_some()` implies `state == Connected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub tracked_ids: BTreeSet<GameId>,
    pub active_id: Option<GameId>,
    pub state: ConnectionState,
}

impl GameSession {
    pub fn is_tracked(&self, game_id: GameId) -> bool {
        self.tracked_ids.contains(&game_id)
    }

    /// True when `game_id` is the attached game and the session is live
    pub fn is_active(&self, game_id: GameId) -> bool {
        self.state == ConnectionState::Connected && self.active_id == Some(game_id)
    }

    pub fn invariant_holds(&self) -> bool {
        self.active_id.is_none() || self.state == ConnectionState::Connected
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// One info update from the event source. `value` is opaque JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFeatureUpdate {
    pub feature: String,
    pub key: String,
    pub value: String,
}

impl RawFeatureUpdate {
    pub fn shop_pieces(value: impl Into<String>) -> Self {
        Self {
            feature: STORE_FEATURE.to_string(),
            key: SHOP_PIECES_KEY.to_string(),
            value: value.into(),
        }
    }

    pub fn is_shop_pieces(&self) -> bool {
        self.feature == STORE_FEATURE && self.key == SHOP_PIECES_KEY
    }
}

// ============================================================================
// Cost tiers
// ============================================================================

/// Shop cost of an entity. `Unknown` is the `"?"` sentinel for ids that no
/// resolution strategy could place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostTier {
    Known(u8),
    Unknown,
}

impl CostTier {
    pub fn is_known(&self) -> bool {
        matches!(self, CostTier::Known(_))
    }

    /// Overlay frame colour per tier
    pub fn color_hex(&self) -> &'static str {
        match self {
            CostTier::Known(1) => "#808080",
            CostTier::Known(2) => "#11b288",
            CostTier::Known(3) => "#207ac7",
            CostTier::Known(4) => "#c38bff",
            CostTier::Known(5) => "#f9d342",
            CostTier::Known(7) => "#ff6b35",
            CostTier::Known(11) => "#ff0000",
            _ => "white",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostTier::Known(cost) => write!(f, "{}", cost),
            CostTier::Unknown => f.write_str("?"),
        }
    }
}

impl Serialize for CostTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CostTier::Known(cost) => serializer.serialize_u8(*cost),
            CostTier::Unknown => serializer.serialize_str("?"),
        }
    }
}

impl<'de> Deserialize<'de> for CostTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawTier {
            Number(u8),
            Text(String),
        }

        Ok(match RawTier::deserialize(deserializer)? {
            RawTier::Number(cost) => CostTier::Known(cost),
            RawTier::Text(text) => text
                .trim()
                .parse::<u8>()
                .map(CostTier::Known)
                .unwrap_or(CostTier::Unknown),
        })
    }
}

// ============================================================================
// Shop snapshot
// ============================================================================

/// A resolved shop occupant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub cost_tier: CostTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Occupant {
    Entity(EntityRef),
    Sold,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// 1-based shop position
    pub slot_index: u8,
    pub occupant: Occupant,
}

impl SlotEntry {
    pub fn empty(slot_index: u8) -> Self {
        Self {
            slot_index,
            occupant: Occupant::Empty,
        }
    }

    pub fn entity(&self) -> Option<&EntityRef> {
        match &self.occupant {
            Occupant::Entity(entity) => Some(entity),
            _ => None,
        }
    }
}

/// The whole shop at one point in time. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopSnapshot {
    pub slots: [SlotEntry; SHOP_SLOT_COUNT],
    /// Literal payload this snapshot was built from
    pub raw_fingerprint: String,
    pub captured_at: DateTime<Utc>,
}

impl ShopSnapshot {
    pub fn has_occupants(&self) -> bool {
        self.slots.iter().any(|slot| slot.entity().is_some())
    }

    pub fn entities(&self) -> impl Iterator<Item = (u8, &EntityRef)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entity().map(|entity| (slot.slot_index, entity)))
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitRef {
    pub name: String,
    pub icon_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub display_name: String,
    pub cost: u8,
    pub image_ref: String,
    pub traits: Vec<TraitRef>,
}

// ============================================================================
// Render model
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub occupied: bool,
    pub cost_tier: Option<CostTier>,
    pub is_wanted: bool,
}

/// Render-ready view of the five shop slots. Regenerated wholesale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderModel {
    pub slots: [SlotView; SHOP_SLOT_COUNT],
}

impl RenderModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| !slot.occupied)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupied).count()
    }
}

/// Resolved icon for a trait: a remote URL or a local one-letter placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IconRef {
    Remote(String),
    Placeholder(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitIcon {
    pub slot_index: u8,
    pub trait_name: String,
    pub icon: IconRef,
}

// ============================================================================
// Errors
// ============================================================================

/// Error types surfaced by the pipeline. None of these abort processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ShopwatchError {
    #[error("Malformed shop payload: {0}")]
    PayloadParse(String),

    #[error("Catalog fetch failed: {0}")]
    CatalogFetch(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Feature registration failed for game {game_id}: {reason}")]
    Registration { game_id: GameId, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_tier_serializes_unknown_as_question_mark() {
        assert_eq!(serde_json::to_string(&CostTier::Known(4)).unwrap(), "4");
        assert_eq!(serde_json::to_string(&CostTier::Unknown).unwrap(), "\"?\"");

        let parsed: Vec<CostTier> = serde_json::from_str(r#"[3, "5", "?", "sold"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                CostTier::Known(3),
                CostTier::Known(5),
                CostTier::Unknown,
                CostTier::Unknown
            ]
        );
    }

    #[test]
    fn test_tier_colors() {
        assert_eq!(CostTier::Known(1).color_hex(), "#808080");
        assert_eq!(CostTier::Known(7).color_hex(), "#ff6b35");
        assert_eq!(CostTier::Known(11).color_hex(), "#ff0000");
        assert_eq!(CostTier::Known(6).color_hex(), "white");
        assert_eq!(CostTier::Unknown.color_hex(), "white");
    }

    #[test]
    fn test_session_invariant() {
        let mut session = GameSession::default();
        assert!(session.invariant_holds());

        session.active_id = Some(21570);
        assert!(!session.invariant_holds());

        session.state = ConnectionState::Connected;
        assert!(session.invariant_holds());
        assert!(session.is_active(21570));
        assert!(!session.is_active(10902));
    }

    #[test]
    fn test_empty_render_model() {
        let model = RenderModel::empty();
        assert!(model.is_empty());
        assert_eq!(model.occupied_count(), 0);
        assert_eq!(model.slots.len(), SHOP_SLOT_COUNT);
    }
}
