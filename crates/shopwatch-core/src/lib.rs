//! ============================================================================
//! SHOPWATCH-CORE: shop telemetry pipeline
//! ============================================================================
//! Turns the game's noisy, partially duplicated store telemetry into a
//! deterministic five-slot render model:
//! - Connection state machine with startup reconciliation
//! - Snapshot builder with literal-payload dedup
//! - Catalog source with a bundled fallback and id resolution cascade
//! - Trait icon resolver with a positive-only cache
//! - Wanted set persisted in an opaque key/value store
//! ============================================================================

pub mod assets;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod pipeline;
pub mod projector;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod types;
pub mod wanted;

// Re-export main types for convenience
pub use types::*;
pub use assets::{AssetResolver, HttpAssetProbe};
pub use catalog::{CatalogSource, FallbackTable, HttpCatalogRemote};
pub use config::ShopwatchConfig;
pub use pipeline::{ChannelRenderer, Pipeline, PipelineEvent, PipelineHandle, RenderUpdate, Renderer};
pub use source::{EventSource, NullEventSource};
pub use store::{MemoryStore, OpaqueStore, RedbStore};
pub use wanted::WantedSet;
