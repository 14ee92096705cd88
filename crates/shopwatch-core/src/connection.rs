//! ============================================================================
//! Connection State Machine - which game instance the pipeline is attached to
//! ============================================================================
//! States: Idle → Detecting → Connected → Idle, plus ElevationBlocked which
//! only a process restart leaves. The machine is pure: it decides, and the
//! pipeline performs the side effects (feature registration, probes, timers).
//!
//! Startup reconciliation runs under an epoch. Every live detected/exit event
//! bumps the epoch, so retry ticks scheduled by an older loop are dropped and
//! at most one path establishes the connection.
//! ============================================================================

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::types::{ConnectionState, GameId, GameSession};

/// Outcome of a game-detected signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Not a tracked game; the host must not attach
    Untracked,
    /// Elevation blocked; nothing attaches until restart
    Blocked,
    /// Attached. `replaced` is the previously active game, if different.
    Connected { replaced: Option<GameId> },
}

#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    session: GameSession,
    reconcile_epoch: u64,
    reconciling: bool,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracked_games(ids: impl IntoIterator<Item = GameId>) -> Self {
        let mut machine = Self::new();
        machine.register_tracked_games(ids);
        machine
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    pub fn active_id(&self) -> Option<GameId> {
        self.session.active_id
    }

    /// Replace the tracked set. The current session is left untouched.
    pub fn register_tracked_games(&mut self, ids: impl IntoIterator<Item = GameId>) {
        self.session.tracked_ids = ids.into_iter().collect::<BTreeSet<_>>();
        info!("Tracking games: {:?}", self.session.tracked_ids);
    }

    /// Live detection from the event source. Stops any reconcile loop.
    pub fn on_game_detected(&mut self, game_id: GameId) -> Detection {
        let detection = self.attach(game_id);
        if matches!(detection, Detection::Connected { .. }) {
            self.stop_reconcile();
        }
        detection
    }

    fn attach(&mut self, game_id: GameId) -> Detection {
        if self.session.state == ConnectionState::ElevationBlocked {
            debug!("Ignoring detection of {} while elevation blocked", game_id);
            return Detection::Blocked;
        }
        if !self.session.is_tracked(game_id) {
            debug!("Ignoring untracked game {}", game_id);
            return Detection::Untracked;
        }

        let replaced = self.session.active_id.filter(|&active| active != game_id);
        if let Some(previous) = replaced {
            info!("Switching active game {} -> {}", previous, game_id);
        }
        self.session.active_id = Some(game_id);
        self.session.state = ConnectionState::Connected;
        info!("Connected to game {}", game_id);
        Detection::Connected { replaced }
    }

    /// Game exited. Returns false when the exit was ignored (untracked,
    /// blocked, or a game other than the active one).
    pub fn on_game_exit(&mut self, game_id: GameId) -> bool {
        if !self.session.is_tracked(game_id) {
            debug!("Ignoring exit of untracked game {}", game_id);
            return false;
        }
        self.stop_reconcile();

        if self.session.state == ConnectionState::ElevationBlocked {
            return false;
        }
        if self.session.active_id.is_some_and(|active| active != game_id) {
            debug!("Exit of inactive game {}", game_id);
            return false;
        }

        self.session.active_id = None;
        self.session.state = ConnectionState::Idle;
        info!("Game {} exited, session idle", game_id);
        true
    }

    /// A tracked game runs elevated; no automatic recovery. Returns true if
    /// an active game was dropped.
    pub fn on_elevation_required(&mut self, game_id: GameId) -> bool {
        if !self.session.is_tracked(game_id) {
            debug!("Ignoring elevation notice for untracked game {}", game_id);
            return false;
        }
        warn!(
            "Game {} requires elevation; restart with matching privileges",
            game_id
        );
        self.stop_reconcile();
        self.session.state = ConnectionState::ElevationBlocked;
        self.session.active_id.take().is_some()
    }

    /// Error reported for a game. An error for the active game drops the
    /// session to Idle; returns true in that case.
    pub fn on_error(&mut self, game_id: GameId) -> bool {
        if !self.session.is_active(game_id) {
            debug!("Ignoring error for inactive game {}", game_id);
            return false;
        }
        self.session.active_id = None;
        self.session.state = ConnectionState::Idle;
        warn!("Game {} reported an error, session idle", game_id);
        true
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Start a new reconcile loop, returning its epoch. None while already
    /// connected or blocked.
    pub fn begin_reconcile(&mut self) -> Option<u64> {
        if matches!(
            self.session.state,
            ConnectionState::Connected | ConnectionState::ElevationBlocked
        ) {
            return None;
        }
        self.reconcile_epoch += 1;
        self.reconciling = true;
        debug!("Reconcile loop started (epoch {})", self.reconcile_epoch);
        Some(self.reconcile_epoch)
    }

    /// True if a tick for `epoch` should still run
    pub fn reconcile_live(&self, epoch: u64) -> bool {
        self.reconciling
            && epoch == self.reconcile_epoch
            && !matches!(
                self.session.state,
                ConnectionState::Connected | ConnectionState::ElevationBlocked
            )
    }

    /// A tick is about to probe: Idle → Detecting
    pub fn start_probe(&mut self, epoch: u64) -> bool {
        if !self.reconcile_live(epoch) {
            debug!("Dropping stale reconcile tick (epoch {})", epoch);
            return false;
        }
        self.session.state = ConnectionState::Detecting;
        true
    }

    /// A probe found data for `game_id`; same transition as a live detection
    pub fn probe_found(&mut self, epoch: u64, game_id: GameId) -> Detection {
        if !self.reconcile_live(epoch) {
            debug!("Dropping probe hit for {} from stale epoch {}", game_id, epoch);
            return Detection::Untracked;
        }
        let detection = self.attach(game_id);
        if matches!(detection, Detection::Connected { .. }) {
            self.reconciling = false;
        }
        detection
    }

    /// No tracked game found this round. Returns true if another tick should
    /// be scheduled.
    pub fn probe_missed(&mut self, epoch: u64) -> bool {
        if !self.reconcile_live(epoch) {
            return false;
        }
        if self.session.state == ConnectionState::Detecting {
            self.session.state = ConnectionState::Idle;
        }
        true
    }

    pub fn stop_reconcile(&mut self) {
        if self.reconciling {
            debug!("Reconcile loop stopped (epoch {})", self.reconcile_epoch);
        }
        self.reconciling = false;
        self.reconcile_epoch += 1;
        if self.session.state == ConnectionState::Detecting {
            self.session.state = ConnectionState::Idle;
        }
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TFT: GameId = 21570;
    const LAUNCHER: GameId = 10902;

    fn machine() -> ConnectionStateMachine {
        ConnectionStateMachine::with_tracked_games([TFT, LAUNCHER])
    }

    #[test]
    fn test_register_does_not_touch_session() {
        let mut sm = machine();
        sm.on_game_detected(TFT);
        sm.register_tracked_games([TFT, 5426]);
        assert_eq!(sm.active_id(), Some(TFT));
        assert!(sm.session().is_tracked(5426));
        assert!(!sm.session().is_tracked(LAUNCHER));
    }

    #[test]
    fn test_detect_and_exit() {
        let mut sm = machine();
        assert_eq!(
            sm.on_game_detected(TFT),
            Detection::Connected { replaced: None }
        );
        assert_eq!(sm.state(), ConnectionState::Connected);
        assert!(sm.session().invariant_holds());

        assert!(sm.on_game_exit(TFT));
        assert_eq!(sm.state(), ConnectionState::Idle);
        assert_eq!(sm.active_id(), None);
    }

    #[test]
    fn test_untracked_detection_is_noop() {
        let mut sm = machine();
        assert_eq!(sm.on_game_detected(999), Detection::Untracked);
        assert_eq!(sm.state(), ConnectionState::Idle);
        assert!(!sm.on_game_exit(999));
    }

    #[test]
    fn test_detection_replaces_active_game() {
        let mut sm = machine();
        sm.on_game_detected(LAUNCHER);
        assert_eq!(
            sm.on_game_detected(TFT),
            Detection::Connected {
                replaced: Some(LAUNCHER)
            }
        );
        // Exit of the replaced game does not detach the new one
        assert!(!sm.on_game_exit(LAUNCHER));
        assert_eq!(sm.active_id(), Some(TFT));
    }

    #[test]
    fn test_elevation_blocks_until_restart() {
        let mut sm = machine();
        sm.on_game_detected(TFT);
        assert!(sm.on_elevation_required(TFT));
        assert_eq!(sm.state(), ConnectionState::ElevationBlocked);
        assert!(sm.session().invariant_holds());

        assert_eq!(sm.on_game_detected(TFT), Detection::Blocked);
        assert!(sm.begin_reconcile().is_none());
        assert_eq!(sm.active_id(), None);
    }

    #[test]
    fn test_untracked_elevation_is_ignored() {
        let mut sm = machine();
        let epoch = sm.begin_reconcile().unwrap();

        assert!(!sm.on_elevation_required(5426));
        assert_eq!(sm.state(), ConnectionState::Idle);
        assert!(sm.reconcile_live(epoch));

        assert_eq!(
            sm.on_game_detected(TFT),
            Detection::Connected { replaced: None }
        );
        assert_eq!(sm.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_error_for_active_game_goes_idle() {
        let mut sm = machine();
        assert!(!sm.on_error(TFT));
        sm.on_game_detected(TFT);
        assert!(sm.on_error(TFT));
        assert_eq!(sm.state(), ConnectionState::Idle);
        assert!(sm.session().invariant_holds());
    }

    #[test]
    fn test_reconcile_probe_hit() {
        let mut sm = machine();
        let epoch = sm.begin_reconcile().unwrap();
        assert!(sm.start_probe(epoch));
        assert_eq!(sm.state(), ConnectionState::Detecting);

        assert_eq!(
            sm.probe_found(epoch, TFT),
            Detection::Connected { replaced: None }
        );
        assert!(!sm.is_reconciling());
        assert!(!sm.start_probe(epoch));
    }

    #[test]
    fn test_reconcile_miss_retries_until_live_detection() {
        let mut sm = machine();
        let epoch = sm.begin_reconcile().unwrap();
        assert!(sm.start_probe(epoch));
        assert!(sm.probe_missed(epoch));
        assert_eq!(sm.state(), ConnectionState::Idle);

        assert!(sm.start_probe(epoch));
        sm.on_game_detected(TFT);

        // The in-flight probe belongs to a dead loop
        assert_eq!(sm.probe_found(epoch, LAUNCHER), Detection::Untracked);
        assert!(!sm.probe_missed(epoch));
        assert_eq!(sm.active_id(), Some(TFT));
    }

    #[test]
    fn test_exit_stops_reconcile() {
        let mut sm = machine();
        let epoch = sm.begin_reconcile().unwrap();
        sm.start_probe(epoch);
        sm.on_game_exit(TFT);

        assert_eq!(sm.state(), ConnectionState::Idle);
        assert!(!sm.start_probe(epoch));

        let next = sm.begin_reconcile().unwrap();
        assert!(next > epoch);
        assert!(sm.start_probe(next));
    }
}
