//! ============================================================================
//! Startup Reconciliation - find a game that was running before we started
//! ============================================================================
//! After a grace period the pipeline registers features for every tracked
//! game and asks the event source for each game's current info. A hit
//! attaches as if the game had just been detected; a miss schedules another
//! round after the retry interval. Ticks are posted back into the pipeline
//! queue and carry the epoch of the loop that scheduled them.
//! ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::pipeline::PipelineEvent;
use crate::source::EventSource;
use crate::types::{GameId, SHOP_PIECES_KEY, STORE_FEATURE};

/// Timing for the reconcile loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Wait before the first probe so the event source can initialize
    pub grace_period_ms: u64,
    /// Delay between probe rounds while no game is found
    pub retry_interval_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 1500,
            retry_interval_ms: 5000,
        }
    }
}

impl ReconcileConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// A tracked game that answered the probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHit {
    pub game_id: GameId,
    /// Shop payload already present in the game's info, if any
    pub shop_pieces: Option<String>,
}

/// Post a reconcile tick for `epoch` after `delay`
pub fn schedule_tick(tx: UnboundedSender<PipelineEvent>, epoch: u64, delay: Duration) {
    tokio::spawn(async move {
        sleep(delay).await;
        if tx.send(PipelineEvent::ReconcileTick { epoch }).is_err() {
            debug!("Pipeline closed before reconcile tick {}", epoch);
        }
    });
}

/// Run one probe round off the dispatcher and post the result back
pub fn spawn_probe_round(
    tx: UnboundedSender<PipelineEvent>,
    source: Arc<dyn EventSource>,
    epoch: u64,
    game_ids: Vec<GameId>,
    features: Vec<String>,
) {
    tokio::spawn(async move {
        let hit = probe_tracked_games(source.as_ref(), &game_ids, &features).await;
        if tx.send(PipelineEvent::ReconcileProbed { epoch, hit }).is_err() {
            debug!("Pipeline closed before probe result {}", epoch);
        }
    });
}

/// Register features for every tracked game, then return the first game
/// whose info query answers. Individual failures are logged and skipped.
pub async fn probe_tracked_games(
    source: &dyn EventSource,
    game_ids: &[GameId],
    features: &[String],
) -> Option<ProbeHit> {
    for &game_id in game_ids {
        if let Err(e) = source.set_required_features(game_id, features).await {
            debug!("Failed to set features for {} during reconcile: {}", game_id, e);
        }
    }

    for &game_id in game_ids {
        match source.get_info(game_id).await {
            Ok(Some(info)) => {
                let shop_pieces = extract_shop_pieces(&info);
                info!(
                    "Found running game {} (shop data: {})",
                    game_id,
                    shop_pieces.is_some()
                );
                return Some(ProbeHit {
                    game_id,
                    shop_pieces,
                });
            }
            Ok(None) => debug!("No existing game found for {}", game_id),
            Err(e) => warn!("Info query for {} failed: {}", game_id, e),
        }
    }
    None
}

/// Pull `store.shop_pieces` out of an info document. Accepts the document
/// with or without its `res` envelope; an object value is re-serialized so
/// it fingerprints like a live update.
pub fn extract_shop_pieces(info: &Value) -> Option<String> {
    let root = info.get("res").unwrap_or(info);
    match root.get(STORE_FEATURE)?.get(SHOP_PIECES_KEY)? {
        Value::String(raw) if !raw.is_empty() => Some(raw.clone()),
        value @ Value::Object(_) => serde_json::to_string(value).ok(),
        _ => None,
    }
}
