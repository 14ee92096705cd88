//! Event source callbacks: the calls the pipeline makes back into the host
//! that delivers game events.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::types::GameId;

/// Features requested from the event source for every tracked game
pub const REQUIRED_FEATURES: &[&str] = &[
    "match_info",
    "store",
    "roster",
    "game_info",
    "board",
    "live_client_data",
];

pub fn required_features() -> Vec<String> {
    REQUIRED_FEATURES.iter().map(|f| f.to_string()).collect()
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opt in to events for `game_id`
    async fn enable_tracking(&self, game_id: GameId) -> Result<()>;

    async fn set_required_features(&self, game_id: GameId, features: &[String]) -> Result<()>;

    /// Current info document for `game_id`, if the game is running
    async fn get_info(&self, game_id: GameId) -> Result<Option<Value>>;
}

/// Source that accepts every call and never reports a running game.
/// Used for replaying recorded events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSource;

#[async_trait]
impl EventSource for NullEventSource {
    async fn enable_tracking(&self, game_id: GameId) -> Result<()> {
        debug!("enable_tracking({}) ignored", game_id);
        Ok(())
    }

    async fn set_required_features(&self, game_id: GameId, features: &[String]) -> Result<()> {
        debug!("set_required_features({}, {:?}) ignored", game_id, features);
        Ok(())
    }

    async fn get_info(&self, _game_id: GameId) -> Result<Option<Value>> {
        Ok(None)
    }
}
