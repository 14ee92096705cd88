//! ============================================================================
//! Wanted Set - user-selected champions to highlight in the shop
//! ============================================================================
//! Persisted as an ordered JSON array under one key of the opaque store.
//! Writes are best-effort: a failed save is logged and the in-memory set
//! stays authoritative for the session.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{normalize_token, strip_set_prefix};
use crate::store::OpaqueStore;
use crate::types::ShopwatchError;

/// Store key holding the wanted ids
pub const WANTED_STORE_KEY: &str = "wanted_champions";

/// Bare names this short only match exactly, never by containment
const MIN_CONTAINMENT_LEN: usize = 2;

pub struct WantedSet {
    ids: Vec<String>,
    store: Arc<dyn OpaqueStore>,
}

impl WantedSet {
    /// Load the persisted set; a missing or unreadable value yields an empty set
    pub fn load(store: Arc<dyn OpaqueStore>) -> Self {
        let ids = match store.get(WANTED_STORE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Ignoring malformed wanted set in store: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read wanted set: {}", e);
                Vec::new()
            }
        };

        let mut set = Self {
            ids: Vec::with_capacity(ids.len()),
            store,
        };
        for id in ids {
            set.insert_unique(id);
        }
        debug!("Loaded {} wanted ids", set.ids.len());
        set
    }

    fn insert_unique(&mut self, id: String) -> bool {
        let id = id.trim().to_string();
        if id.is_empty() || self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Write the set to the store
    pub fn save(&self) -> Result<(), ShopwatchError> {
        let payload = serde_json::to_string(&self.ids)
            .map_err(|e| ShopwatchError::Store(format!("serialize wanted set: {}", e)))?;
        self.store
            .set(WANTED_STORE_KEY, &payload)
            .map_err(|e| ShopwatchError::Store(format!("persist wanted set: {}", e)))
    }

    /// Mutations keep the in-memory set even when the store fails
    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!("{}", e);
        }
    }

    /// Flip membership of `id` and persist. Returns whether it is now wanted.
    pub fn toggle(&mut self, id: &str) -> bool {
        let id = id.trim();
        let now_wanted = if let Some(pos) = self.ids.iter().position(|w| w == id) {
            self.ids.remove(pos);
            false
        } else {
            self.insert_unique(id.to_string())
        };
        info!("Wanted {} -> {}", id, now_wanted);
        self.persist();
        now_wanted
    }

    pub fn add(&mut self, id: &str) -> bool {
        let added = self.insert_unique(id.to_string());
        if added {
            self.persist();
        }
        added
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|w| w != id.trim());
        let removed = self.ids.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Replace the whole set, e.g. from a team builder
    pub fn replace_all(&mut self, ids: impl IntoIterator<Item = String>) {
        self.ids.clear();
        for id in ids {
            self.insert_unique(id);
        }
        self.persist();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|w| w == id)
    }

    /// Membership tolerant of id drift between content sets: exact id, equal
    /// bare names, or a wanted bare name contained in the occupant id
    pub fn matches(&self, occupant_id: &str) -> bool {
        if self.contains(occupant_id) {
            return true;
        }

        let occupant = normalize_token(occupant_id);
        let occupant_bare = normalize_token(strip_set_prefix(occupant_id));
        self.ids.iter().any(|wanted| {
            let wanted_bare = normalize_token(strip_set_prefix(wanted));
            if wanted_bare.is_empty() {
                return false;
            }
            wanted_bare == occupant_bare
                || (wanted_bare.len() > MIN_CONTAINMENT_LEN && occupant.contains(&wanted_bare))
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
