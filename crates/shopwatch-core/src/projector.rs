//! Render projection: snapshot + wanted set + catalog → fixed five-slot view.
//! Pure and idempotent; the pipeline calls it after every snapshot or wanted
//! set change.

use crate::catalog::Catalog;
use crate::types::{CostTier, RenderModel, ShopSnapshot, SlotView};
use crate::wanted::WantedSet;

/// A trait icon the renderer will need for an occupied slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitIconRequest {
    pub slot_index: u8,
    pub trait_name: String,
    pub hint: Option<String>,
}

pub fn project(
    snapshot: Option<&ShopSnapshot>,
    wanted: &WantedSet,
    catalog: &Catalog,
) -> RenderModel {
    let mut model = RenderModel::empty();
    let Some(snapshot) = snapshot else {
        return model;
    };

    for (slot_index, entity) in snapshot.entities() {
        let cost_tier = match entity.cost_tier {
            // A catalog loaded after the snapshot may know the id
            CostTier::Unknown => catalog
                .get(&entity.id)
                .map(|entry| CostTier::Known(entry.cost))
                .unwrap_or(CostTier::Unknown),
            known => known,
        };

        model.slots[usize::from(slot_index) - 1] = SlotView {
            occupied: true,
            cost_tier: Some(cost_tier),
            is_wanted: wanted.matches(&entity.id),
        };
    }
    model
}

/// Trait icons for every occupied slot, in slot order
pub fn trait_icon_requests(snapshot: &ShopSnapshot, catalog: &Catalog) -> Vec<TraitIconRequest> {
    snapshot
        .entities()
        .filter_map(|(slot_index, entity)| {
            catalog.get(&entity.id).map(|entry| (slot_index, entry))
        })
        .flat_map(|(slot_index, entry)| {
            entry.traits.iter().map(move |t| TraitIconRequest {
                slot_index,
                trait_name: t.name.clone(),
                hint: t.icon_ref.clone(),
            })
        })
        .collect()
}
