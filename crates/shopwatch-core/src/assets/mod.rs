//! ============================================================================
//! Assets Module - Trait icon resolution
//! ============================================================================
//! Finds a loadable icon URL for a trait name by probing historical naming
//! conventions, newest content set first.
//!
//! ## Usage
//! ```rust,ignore
//! use shopwatch_core::assets::{AssetResolver, AssetSettings, HttpAssetProbe};
//!
//! let probe = Arc::new(HttpAssetProbe::new(Duration::from_secs(3)));
//! let resolver = AssetResolver::new(probe, settings);
//! let icon = resolver.resolve_trait_icon("Sniper", hint).await;
//! ```
//! ============================================================================

mod candidates;
mod probe;
mod resolver;

pub use candidates::{
    camel_preserved, flat_lower, hint_variants, normalize_asset_path, snake_case,
    trait_cache_key, trait_icon_candidates,
};
pub use probe::{AssetProbe, HttpAssetProbe};
pub use resolver::{placeholder, AssetResolver, AssetSettings};
