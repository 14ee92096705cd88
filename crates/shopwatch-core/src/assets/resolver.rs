//! ============================================================================
//! Asset Resolver - trait icon lookup with a positive-only cache
//! ============================================================================
//! Only confirmed-loadable URLs are cached. A URL that later fails to load is
//! evicted so the next lookup re-probes; failures are never remembered.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::candidates::{trait_cache_key, trait_icon_candidates};
use super::probe::AssetProbe;
use crate::types::IconRef;

/// Where to look for icons
#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub asset_base: String,
    /// Content set versions to try, any order (probed newest first)
    pub versions: Vec<u32>,
}

/// Trait icon resolver shared by the pipeline and its icon tasks
pub struct AssetResolver {
    probe: Arc<dyn AssetProbe>,
    settings: AssetSettings,
    cache: RwLock<HashMap<String, String>>,
}

impl AssetResolver {
    pub fn new(probe: Arc<dyn AssetProbe>, settings: AssetSettings) -> Self {
        Self {
            probe,
            settings,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a trait icon, probing candidates on a cache miss.
    /// Falls back to a one-letter placeholder that is not cached.
    pub async fn resolve_trait_icon(&self, name: &str, hint_url: Option<&str>) -> IconRef {
        let key = trait_cache_key(name);

        {
            let cache = self.cache.read().await;
            if let Some(url) = cache.get(&key) {
                debug!("Icon cache hit for {}: {}", name, url);
                return IconRef::Remote(url.clone());
            }
        }

        let candidates = trait_icon_candidates(
            name,
            hint_url,
            &self.settings.asset_base,
            &self.settings.versions,
        );
        debug!("Icon cache miss for {}, probing {} candidates", name, candidates.len());

        for url in candidates {
            if self.probe.probe(&url).await {
                info!("Resolved icon for {}: {}", name, url);
                self.cache.write().await.insert(key, url.clone());
                return IconRef::Remote(url);
            }
        }

        warn!("No icon found for trait {}, using placeholder", name);
        placeholder(name)
    }

    /// The renderer could not load `url`: evict every entry pointing at it
    pub async fn report_failed(&self, url: &str) -> usize {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, cached| cached != url);
        let evicted = before - cache.len();
        if evicted > 0 {
            info!("Evicted {} icon cache entries for failed url {}", evicted, url);
        }
        evicted
    }

    /// The renderer loaded `url` for trait `name`
    pub async fn report_succeeded(&self, url: &str, name: &str) {
        let key = trait_cache_key(name);
        if key.is_empty() {
            return;
        }
        self.cache.write().await.insert(key, url.to_string());
    }

    pub async fn cached(&self, name: &str) -> Option<String> {
        self.cache.read().await.get(&trait_cache_key(name)).cloned()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Drop every cached icon
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let count = cache.len();
        cache.clear();
        info!("Cleared {} cached icons", count);
    }
}

/// First letter of the name, uppercased; `?` for names without one
pub fn placeholder(name: &str) -> IconRef {
    let letter = name
        .chars()
        .find(|c| c.is_alphanumeric())
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or('?');
    IconRef::Placeholder(letter)
}
