//! ============================================================================
//! Catalog Source - TTL-cached entity catalog with static fallback
//! ============================================================================
//! Provides the current content set's entities without hitting the remote on
//! every lookup. The cache lock is held across the fetch, so concurrent
//! callers wait on the one in-flight request and share its result.
//! ============================================================================

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::fallback::FallbackTable;
use super::remote::{parse_content_set, CatalogRemote};
use super::resolve::{bare_name, resolve_cost, set_prefix};
use crate::assets::normalize_asset_path;
use crate::types::{CatalogEntry, CostTier, ShopwatchError};

/// Default cache duration (1 hour)
pub const DEFAULT_CATALOG_TTL_SECS: u64 = 3600;

/// Where a catalog's entries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    Remote,
    Fallback,
}

/// Immutable id → entry mapping for one content set
#[derive(Debug, Clone)]
pub struct Catalog {
    set_number: u32,
    origin: CatalogOrigin,
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new(
        set_number: u32,
        origin: CatalogOrigin,
        entries: impl IntoIterator<Item = CatalogEntry>,
    ) -> Self {
        Self {
            set_number,
            origin,
            entries: entries
                .into_iter()
                .map(|entry| (entry.id.clone(), entry))
                .collect(),
        }
    }

    /// Catalog built from the static table: no traits, derived images
    pub fn from_fallback(table: &FallbackTable, set_number: u32, asset_base: &str) -> Self {
        Self::new(
            set_number,
            CatalogOrigin::Fallback,
            table.iter().map(|(id, cost)| CatalogEntry {
                id: id.to_string(),
                display_name: bare_name(id).to_string(),
                cost,
                image_ref: fallback_image_ref(asset_base, id, set_number),
                traits: vec![],
            }),
        )
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn origin(&self) -> CatalogOrigin {
        self.origin
    }

    pub fn set_number(&self) -> u32 {
        self.set_number
    }

    pub fn set_prefix(&self) -> String {
        set_prefix(self.set_number)
    }
}

/// Square portrait path for an id, following the game's asset layout
pub fn fallback_image_ref(asset_base: &str, id: &str, set_number: u32) -> String {
    let lower = id.to_lowercase();
    let path = format!(
        "assets/characters/{lower}/hud/{lower}_square.tft_set{set_number}.png"
    );
    normalize_asset_path(asset_base, &path).unwrap_or(path)
}

/// Cache and content-set settings
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub set_number: u32,
    pub asset_base: String,
    /// How long a remote catalog stays fresh
    pub ttl: Duration,
    /// How long a fallback catalog is served before the remote is retried
    pub fallback_retry: Duration,
}

#[derive(Debug, Clone)]
struct CachedCatalog {
    catalog: Arc<Catalog>,
    fetched_at: Instant,
    valid_for: Duration,
}

/// Process-wide catalog provider
pub struct CatalogSource {
    remote: Arc<dyn CatalogRemote>,
    fallback: Arc<FallbackTable>,
    settings: CatalogSettings,
    cache: Mutex<Option<CachedCatalog>>,
}

impl CatalogSource {
    pub fn new(
        remote: Arc<dyn CatalogRemote>,
        fallback: Arc<FallbackTable>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            remote,
            fallback,
            settings,
            cache: Mutex::new(None),
        }
    }

    pub fn fallback_table(&self) -> Arc<FallbackTable> {
        Arc::clone(&self.fallback)
    }

    /// Current catalog, fetching when the cached one is stale or missing
    pub async fn get_catalog(&self) -> Arc<Catalog> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < cached.valid_for {
                debug!("Catalog cache hit (age: {}s)", age.as_secs());
                return Arc::clone(&cached.catalog);
            }
        }

        let (catalog, valid_for) = match self.fetch_remote().await {
            Ok(catalog) => {
                info!(
                    "Loaded remote catalog for set {} ({} entries)",
                    catalog.set_number(),
                    catalog.len()
                );
                (catalog, self.settings.ttl)
            }
            Err(e) => {
                warn!("{} - using bundled fallback table", e);
                (self.fallback_catalog(), self.settings.fallback_retry)
            }
        };

        let catalog = Arc::new(catalog);
        *cache = Some(CachedCatalog {
            catalog: Arc::clone(&catalog),
            fetched_at: Instant::now(),
            valid_for,
        });
        catalog
    }

    async fn fetch_remote(&self) -> Result<Catalog, ShopwatchError> {
        let document = self
            .remote
            .fetch_content_set_definition()
            .await
            .map_err(|e| ShopwatchError::CatalogFetch(e.to_string()))?;

        let entries = parse_content_set(
            document,
            self.settings.set_number,
            &self.settings.asset_base,
        )?;
        if entries.is_empty() {
            return Err(ShopwatchError::CatalogFetch(format!(
                "no playable entries for set {}",
                self.settings.set_number
            )));
        }

        Ok(Catalog::new(
            self.settings.set_number,
            CatalogOrigin::Remote,
            entries,
        ))
    }

    /// Catalog built from the bundled table alone
    pub fn fallback_catalog(&self) -> Catalog {
        Catalog::from_fallback(
            &self.fallback,
            self.settings.set_number,
            &self.settings.asset_base,
        )
    }

    /// Cached catalog while it is still fresh. Never fetches, and returns
    /// None instead of waiting while a fetch holds the cache.
    pub fn fresh(&self) -> Option<Arc<Catalog>> {
        let cache = self.cache.try_lock().ok()?;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < cached.valid_for)
            .map(|cached| Arc::clone(&cached.catalog))
    }

    /// Last catalog loaded, fresh or not, without fetching
    pub async fn cached(&self) -> Option<Arc<Catalog>> {
        self.cache
            .lock()
            .await
            .as_ref()
            .map(|cached| Arc::clone(&cached.catalog))
    }

    /// Force the next `get_catalog` to fetch
    pub async fn invalidate(&self) {
        if self.cache.lock().await.take().is_some() {
            info!("Invalidated catalog cache");
        }
    }

    /// Resolve a raw shop id against the current catalog
    pub async fn resolve_cost(&self, raw_id: &str) -> CostTier {
        let catalog = self.get_catalog().await;
        resolve_cost(raw_id, &catalog, &self.fallback)
    }
}
