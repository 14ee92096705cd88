//! ============================================================================
//! Catalog Module - Entity catalog and identifier resolution
//! ============================================================================
//! Provides cost, trait and image data for shop units.
//!
//! ## Sources
//! - **Remote**: the content-set definition document, cached for an hour
//! - **Fallback**: the bundled id → cost table, used when the remote is down
//!   or yields nothing for the active set
//!
//! ## Usage
//! ```rust,ignore
//! use shopwatch_core::catalog::{CatalogSource, FallbackTable, HttpCatalogRemote};
//!
//! let remote = Arc::new(HttpCatalogRemote::new(url, Duration::from_secs(10)));
//! let source = CatalogSource::new(remote, FallbackTable::bundled(), settings);
//! let tier = source.resolve_cost("TFT16_KogMaw").await;
//! ```
//! ============================================================================

mod fallback;
mod remote;
mod resolve;
mod source;

pub use fallback::{FallbackTable, BUNDLED_SET_NUMBER};
pub use remote::{
    is_non_playable, parse_content_set, CatalogRemote, HttpCatalogRemote, NON_PLAYABLE_TOKENS,
};
pub use resolve::{
    bare_name, normalize_token, resolve_cost, resolve_cost_traced, set_prefix, strip_set_prefix,
    ResolutionPath,
};
pub use source::{
    fallback_image_ref, Catalog, CatalogOrigin, CatalogSettings, CatalogSource,
    DEFAULT_CATALOG_TTL_SECS,
};
