//! Runtime configuration. `Default` reads environment overrides, so a `.env`
//! loaded by the binary applies without extra plumbing.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::assets::AssetSettings;
use crate::catalog::{CatalogSettings, BUNDLED_SET_NUMBER, DEFAULT_CATALOG_TTL_SECS};
use crate::reconcile::ReconcileConfig;
use crate::source::required_features;
use crate::types::{GameId, ShopwatchError};

/// Teamfight Tactics
pub const TFT_GAME_ID: GameId = 21570;
/// League of Legends launcher
pub const LAUNCHER_GAME_ID: GameId = 10902;

pub const DEFAULT_CATALOG_URL: &str = "https://raw.communitydragon.org/latest/cdragon/tft/en_us.json";
pub const DEFAULT_ASSET_BASE: &str = "https://raw.communitydragon.org/latest/game/";

/// Oldest content set whose icon naming is still probed
const OLDEST_ASSET_VERSION: u32 = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopwatchConfig {
    pub tracked_games: Vec<GameId>,
    pub required_features: Vec<String>,
    pub reconcile: ReconcileConfig,
    pub catalog_url: String,
    pub catalog_timeout_secs: u64,
    pub catalog_ttl_secs: u64,
    /// How long a fallback catalog is served before the remote is retried
    pub fallback_retry_secs: u64,
    pub set_number: u32,
    pub asset_base: String,
    /// Content set versions probed for trait icons, newest first
    pub asset_versions: Vec<u32>,
    pub probe_timeout_ms: u64,
    /// Store file override; `store_path` falls back to the home directory
    pub db_path: Option<String>,
}

impl Default for ShopwatchConfig {
    fn default() -> Self {
        let set_number = std::env::var("SHOPWATCH_SET_NUMBER")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(BUNDLED_SET_NUMBER);

        Self {
            tracked_games: vec![TFT_GAME_ID, LAUNCHER_GAME_ID],
            required_features: required_features(),
            reconcile: ReconcileConfig::default(),
            catalog_url: std::env::var("SHOPWATCH_CATALOG_URL")
                .unwrap_or_else(|_| DEFAULT_CATALOG_URL.to_string()),
            catalog_timeout_secs: 10,
            catalog_ttl_secs: DEFAULT_CATALOG_TTL_SECS,
            fallback_retry_secs: 60,
            set_number,
            asset_base: std::env::var("SHOPWATCH_ASSET_BASE")
                .unwrap_or_else(|_| DEFAULT_ASSET_BASE.to_string()),
            asset_versions: (OLDEST_ASSET_VERSION..=set_number.max(OLDEST_ASSET_VERSION))
                .rev()
                .collect(),
            probe_timeout_ms: 3000,
            db_path: std::env::var("SHOPWATCH_DB_PATH").ok(),
        }
    }
}

impl ShopwatchConfig {
    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            set_number: self.set_number,
            asset_base: self.asset_base.clone(),
            ttl: Duration::from_secs(self.catalog_ttl_secs),
            fallback_retry: Duration::from_secs(self.fallback_retry_secs),
        }
    }

    pub fn asset_settings(&self) -> AssetSettings {
        AssetSettings {
            asset_base: self.asset_base.clone(),
            versions: self.asset_versions.clone(),
        }
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// `db_path` when set, otherwise ~/.shopwatch/store.redb
    pub fn store_path(&self) -> Result<PathBuf, ShopwatchError> {
        match &self.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => dirs::home_dir()
                .map(|home| home.join(".shopwatch").join("store.redb"))
                .ok_or_else(|| ShopwatchError::Store("cannot determine home directory".to_string())),
        }
    }
}
