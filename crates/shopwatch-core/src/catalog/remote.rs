//! ============================================================================
//! Catalog Remote - content-set definition over HTTP
//! ============================================================================
//! Fetches the community-maintained TFT data document and maps the active
//! content set's champions to `CatalogEntry` values.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::resolve::set_prefix;
use super::source::fallback_image_ref;
use crate::assets::normalize_asset_path;
use crate::types::{CatalogEntry, ShopwatchError, TraitRef};

/// Ids containing any of these (case-insensitive) are not shop units
pub const NON_PLAYABLE_TOKENS: &[&str] = &[
    "dummy",
    "minion",
    "golem",
    "krug",
    "raptor",
    "murkwolf",
    "scuttle",
    "voidspawn",
    "npc",
    "carousel",
    "portal",
    "armory",
    "augment",
    "_item",
];

/// Source of the raw content-set definition document
#[async_trait]
pub trait CatalogRemote: Send + Sync {
    async fn fetch_content_set_definition(&self) -> Result<Value>;
}

/// Fetches the definition document with a plain GET
pub struct HttpCatalogRemote {
    client: Client,
    url: String,
}

impl HttpCatalogRemote {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogRemote for HttpCatalogRemote {
    async fn fetch_content_set_definition(&self) -> Result<Value> {
        debug!("Fetching content set definition from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to fetch catalog: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Catalog request failed with status {}", status));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| anyhow!("Failed to parse catalog response: {}", e))
    }
}

// ============================================================================
// Document shape
// ============================================================================

#[derive(Debug, Deserialize)]
struct ContentSetDocument {
    #[serde(default, rename = "setData")]
    set_data: Vec<SetDefinition>,
    #[serde(default)]
    sets: HashMap<String, SetDefinition>,
}

#[derive(Debug, Deserialize)]
struct SetDefinition {
    #[serde(default)]
    mutator: Option<String>,
    #[serde(default)]
    champions: Vec<ChampionDefinition>,
    #[serde(default)]
    traits: Vec<TraitDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChampionDefinition {
    api_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    cost: Option<u8>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    square_icon: Option<String>,
    #[serde(default)]
    traits: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TraitDefinition {
    #[serde(default)]
    api_name: Option<String>,
    name: String,
    #[serde(default)]
    icon: Option<String>,
}

pub fn is_non_playable(id: &str) -> bool {
    let lower = id.to_lowercase();
    NON_PLAYABLE_TOKENS.iter().any(|token| lower.contains(token))
}

/// Map the document's entry for `set_number` to catalog entries.
/// Only ids carrying the set's own prefix are kept.
pub fn parse_content_set(
    document: Value,
    set_number: u32,
    asset_base: &str,
) -> Result<Vec<CatalogEntry>, ShopwatchError> {
    let mut document: ContentSetDocument = serde_json::from_value(document)
        .map_err(|e| ShopwatchError::CatalogFetch(format!("unexpected document shape: {}", e)))?;

    let mutator = format!("TFTSet{}", set_number);
    let set = match document
        .set_data
        .into_iter()
        .find(|set| set.mutator.as_deref() == Some(mutator.as_str()))
    {
        Some(set) => set,
        None => document.sets.remove(&set_number.to_string()).ok_or_else(|| {
            ShopwatchError::CatalogFetch(format!("content set {} not in document", set_number))
        })?,
    };

    let mut trait_icons: HashMap<String, Option<String>> = HashMap::new();
    for definition in &set.traits {
        let icon = definition
            .icon
            .as_deref()
            .and_then(|path| normalize_asset_path(asset_base, path));
        if let Some(api_name) = &definition.api_name {
            trait_icons.insert(api_name.clone(), icon.clone());
        }
        trait_icons.insert(definition.name.clone(), icon);
    }

    let prefix = set_prefix(set_number);
    let entries: Vec<CatalogEntry> = set
        .champions
        .into_iter()
        .filter(|champion| champion.api_name.starts_with(&prefix))
        .filter(|champion| !is_non_playable(&champion.api_name))
        .filter_map(|champion| {
            let cost = champion.cost.filter(|cost| *cost > 0)?;
            let image_ref = champion
                .square_icon
                .as_deref()
                .or(champion.icon.as_deref())
                .and_then(|path| normalize_asset_path(asset_base, path))
                .unwrap_or_else(|| fallback_image_ref(asset_base, &champion.api_name, set_number));
            let traits = champion
                .traits
                .iter()
                .map(|name| TraitRef {
                    name: name.clone(),
                    icon_ref: trait_icons.get(name).cloned().flatten(),
                })
                .collect();

            Some(CatalogEntry {
                display_name: champion.name.unwrap_or_else(|| champion.api_name.clone()),
                id: champion.api_name,
                cost,
                image_ref,
                traits,
            })
        })
        .collect();

    debug!("Parsed {} playable entries for set {}", entries.len(), set_number);
    Ok(entries)
}
