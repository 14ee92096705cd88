//! ============================================================================
//! Pipeline - single-queue dispatcher driving every component
//! ============================================================================
//! All events, whether from the event source, the renderer, the user or our own
//! timers and background tasks, land in one unbounded queue and are handled in
//! arrival order by the task that owns the session, the snapshot builder and
//! the wanted set. Work that can block (feature registration, reconcile
//! probes, catalog loads, icon probing) runs in spawned tasks that post
//! results back. A shop update that finds no fresh catalog is resolved
//! against the last catalog seen (or the bundled table) and re-projected
//! once the load lands.
//!
//! Every accepted snapshot and every clear bumps the generation counter.
//! Icon results stamped with an older generation are dropped, so the latest
//! snapshot always wins.
//! ============================================================================

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::assets::AssetResolver;
use crate::catalog::{Catalog, CatalogSource};
use crate::config::ShopwatchConfig;
use crate::connection::{ConnectionStateMachine, Detection};
use crate::projector::{project, trait_icon_requests, TraitIconRequest};
use crate::reconcile::{schedule_tick, spawn_probe_round, ProbeHit};
use crate::snapshot::{ShopOutcome, ShopSnapshotBuilder};
use crate::source::EventSource;
use crate::types::{
    ConnectionState, GameId, GameSession, RawFeatureUpdate, RenderModel, ShopSnapshot,
    ShopwatchError, TraitIcon,
};
use crate::wanted::WantedSet;

// ============================================================================
// Events
// ============================================================================

/// Everything the dispatcher reacts to. The serialized form (one JSON object
/// per line, tagged by `type`) is the replay format; internal variants are
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The event source finished initializing
    SourceReady,
    GameDetected {
        game_id: GameId,
    },
    GameExit {
        game_id: GameId,
    },
    FeatureUpdate {
        game_id: GameId,
        update: RawFeatureUpdate,
    },
    /// Discrete in-game event; logged only
    GameEvent {
        game_id: GameId,
        name: String,
        #[serde(default)]
        data: Value,
    },
    ElevationRequired {
        game_id: GameId,
    },
    SourceError {
        game_id: GameId,
        #[serde(default)]
        info: Value,
    },
    /// The renderer could not load an icon URL
    AssetLoadFailed {
        url: String,
    },
    AssetLoadSucceeded {
        url: String,
        name: String,
    },
    ToggleWanted {
        id: String,
    },
    #[serde(skip)]
    ReconcileTick {
        epoch: u64,
    },
    #[serde(skip)]
    ReconcileProbed {
        epoch: u64,
        hit: Option<ProbeHit>,
    },
    #[serde(skip)]
    CatalogLoaded {
        catalog: Arc<Catalog>,
    },
    #[serde(skip)]
    TraitIconsResolved {
        generation: u64,
        icons: Vec<TraitIcon>,
    },
    Shutdown,
}

/// Output towards the renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderUpdate {
    Frame { generation: u64, model: RenderModel },
    /// Hide the overlay
    Cleared { generation: u64 },
    TraitIcons { generation: u64, icons: Vec<TraitIcon> },
}

impl RenderUpdate {
    pub fn generation(&self) -> u64 {
        match self {
            RenderUpdate::Frame { generation, .. }
            | RenderUpdate::Cleared { generation }
            | RenderUpdate::TraitIcons { generation, .. } => *generation,
        }
    }
}

pub trait Renderer: Send {
    fn render(&mut self, update: RenderUpdate);
}

/// Forwards render updates to a channel
pub struct ChannelRenderer {
    tx: UnboundedSender<RenderUpdate>,
}

impl ChannelRenderer {
    pub fn new() -> (Self, UnboundedReceiver<RenderUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, update: RenderUpdate) {
        if self.tx.send(update).is_err() {
            debug!("Render receiver dropped");
        }
    }
}

/// Cloneable sender into the pipeline queue
#[derive(Clone)]
pub struct PipelineHandle {
    tx: UnboundedSender<PipelineEvent>,
}

impl PipelineHandle {
    /// Queue an event. Returns false once the pipeline is gone.
    pub fn send(&self, event: PipelineEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct Pipeline {
    config: ShopwatchConfig,
    connection: ConnectionStateMachine,
    builder: ShopSnapshotBuilder,
    catalog: Arc<CatalogSource>,
    assets: Arc<AssetResolver>,
    wanted: WantedSet,
    source: Arc<dyn EventSource>,
    renderer: Box<dyn Renderer>,
    tx: UnboundedSender<PipelineEvent>,
    rx: UnboundedReceiver<PipelineEvent>,
    generation: u64,
    last_catalog: Option<Arc<Catalog>>,
    catalog_loading: bool,
    /// The held snapshot was resolved against a stand-in catalog
    stand_in: bool,
    last_model: RenderModel,
}

impl Pipeline {
    pub fn new(
        config: ShopwatchConfig,
        catalog: Arc<CatalogSource>,
        assets: Arc<AssetResolver>,
        wanted: WantedSet,
        source: Arc<dyn EventSource>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection =
            ConnectionStateMachine::with_tracked_games(config.tracked_games.iter().copied());
        Self {
            config,
            connection,
            builder: ShopSnapshotBuilder::new(),
            catalog,
            assets,
            wanted,
            source,
            renderer,
            tx,
            rx,
            generation: 0,
            last_catalog: None,
            catalog_loading: false,
            stand_in: false,
            last_model: RenderModel::empty(),
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn session(&self) -> &GameSession {
        self.connection.session()
    }

    pub fn current_model(&self) -> RenderModel {
        self.last_model
    }

    pub fn snapshot(&self) -> Option<&ShopSnapshot> {
        self.builder.current()
    }

    pub fn wanted(&self) -> &WantedSet {
        &self.wanted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Kick off startup reconciliation after the grace period
    pub fn start(&mut self) {
        self.restart_reconcile();
    }

    /// Process events until `Shutdown`
    pub async fn run(&mut self) {
        info!("Pipeline running");
        while let Some(event) = self.rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        self.connection.stop_reconcile();
        info!("Pipeline stopped");
    }

    /// Handle everything already queued without waiting for more.
    /// Returns the number of events processed.
    pub async fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.rx.try_recv() {
            processed += 1;
            if !self.handle_event(event).await {
                break;
            }
        }
        processed
    }

    /// Handle one event. Returns false on shutdown.
    pub async fn handle_event(&mut self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::SourceReady => {
                info!("Event source ready, registering features for tracked games");
                let ids = self.config.tracked_games.clone();
                self.spawn_registration(ids, false);
            }
            PipelineEvent::GameDetected { game_id } => {
                if let Detection::Connected { replaced } = self.connection.on_game_detected(game_id)
                {
                    self.attached(game_id, replaced);
                }
            }
            PipelineEvent::GameExit { game_id } => {
                if self.connection.on_game_exit(game_id) {
                    self.clear();
                }
            }
            PipelineEvent::FeatureUpdate { game_id, update } => {
                self.apply_update(game_id, update);
            }
            PipelineEvent::GameEvent {
                game_id,
                name,
                data,
            } => {
                debug!("Game event from {}: {} {}", game_id, name, data);
            }
            PipelineEvent::ElevationRequired { game_id } => {
                error!("Game {} runs elevated; restart shopwatch with the same privileges", game_id);
                if self.connection.on_elevation_required(game_id) {
                    self.clear();
                }
            }
            PipelineEvent::SourceError { game_id, info } => {
                warn!("Event source error for game {}: {}", game_id, info);
                if self.connection.on_error(game_id) {
                    self.clear();
                    self.restart_reconcile();
                }
            }
            PipelineEvent::AssetLoadFailed { url } => {
                self.assets.report_failed(&url).await;
            }
            PipelineEvent::AssetLoadSucceeded { url, name } => {
                self.assets.report_succeeded(&url, &name).await;
            }
            PipelineEvent::ToggleWanted { id } => {
                self.wanted.toggle(&id);
                self.reproject();
            }
            PipelineEvent::ReconcileTick { epoch } => {
                if self.connection.start_probe(epoch) {
                    debug!("Probing tracked games (epoch {})", epoch);
                    spawn_probe_round(
                        self.tx.clone(),
                        Arc::clone(&self.source),
                        epoch,
                        self.config.tracked_games.clone(),
                        self.config.required_features.clone(),
                    );
                }
            }
            PipelineEvent::ReconcileProbed { epoch, hit } => {
                self.reconcile_result(epoch, hit);
            }
            PipelineEvent::CatalogLoaded { catalog } => {
                debug!("Catalog loaded ({} entries)", catalog.len());
                self.catalog_loading = false;
                self.last_catalog = Some(catalog);
                if std::mem::take(&mut self.stand_in) {
                    self.catalog_arrived();
                }
            }
            PipelineEvent::TraitIconsResolved { generation, icons } => {
                if generation != self.generation
                    || self.connection.state() != ConnectionState::Connected
                {
                    debug!(
                        "Dropping {} icons from stale generation {} (current {})",
                        icons.len(),
                        generation,
                        self.generation
                    );
                } else {
                    self.renderer
                        .render(RenderUpdate::TraitIcons { generation, icons });
                }
            }
            PipelineEvent::Shutdown => {
                info!("Pipeline shutdown requested");
                return false;
            }
        }
        true
    }

    fn attached(&mut self, game_id: GameId, replaced: Option<GameId>) {
        if replaced.is_some() {
            self.clear();
        }
        self.spawn_registration(vec![game_id], true);
        if self.catalog.fresh().is_none() {
            self.load_catalog();
        }
    }

    fn reconcile_result(&mut self, epoch: u64, hit: Option<ProbeHit>) {
        match hit {
            Some(ProbeHit {
                game_id,
                shop_pieces,
            }) => {
                if let Detection::Connected { replaced } =
                    self.connection.probe_found(epoch, game_id)
                {
                    self.attached(game_id, replaced);
                    if let Some(raw) = shop_pieces {
                        info!("Found existing shop data for {}", game_id);
                        self.apply_update(game_id, RawFeatureUpdate::shop_pieces(raw));
                    }
                }
            }
            None => {
                if self.connection.probe_missed(epoch) {
                    info!(
                        "No game found, will retry in {}ms",
                        self.config.reconcile.retry_interval_ms
                    );
                    schedule_tick(
                        self.tx.clone(),
                        epoch,
                        self.config.reconcile.retry_interval(),
                    );
                }
            }
        }
    }

    fn restart_reconcile(&mut self) {
        if let Some(epoch) = self.connection.begin_reconcile() {
            schedule_tick(
                self.tx.clone(),
                epoch,
                self.config.reconcile.grace_period(),
            );
        }
    }

    fn apply_update(&mut self, game_id: GameId, update: RawFeatureUpdate) {
        if !self.connection.session().is_active(game_id) {
            debug!("Ignoring update from inactive game {}", game_id);
            return;
        }
        if !ShopSnapshotBuilder::is_relevant(&update) {
            debug!("Ignoring {}/{} update", update.feature, update.key);
            return;
        }
        if self.builder.is_duplicate(&update.value) {
            debug!("Duplicate shop payload, skipping");
            return;
        }

        let (catalog, fresh) = self.current_catalog();
        let fallback = self.catalog.fallback_table();

        match self.builder.accept(&update, &catalog, &fallback) {
            ShopOutcome::Updated(snapshot) => {
                self.generation += 1;
                self.stand_in = !fresh;
                let model = project(Some(&snapshot), &self.wanted, &catalog);
                self.emit_frame(model);
                let requests = trait_icon_requests(&snapshot, &catalog);
                self.spawn_icon_resolution(self.generation, requests);
                self.last_catalog = Some(catalog);
            }
            ShopOutcome::Empty(_) => {
                self.last_catalog = Some(catalog);
                self.clear_overlay();
            }
            ShopOutcome::ParseFailed(e) => {
                debug!("Keeping previous snapshot after: {}", e);
            }
            ShopOutcome::Duplicate | ShopOutcome::Ignored => {}
        }
    }

    /// Fresh catalog if cached. Otherwise the last catalog seen, or the
    /// bundled table, while a background load runs.
    fn current_catalog(&mut self) -> (Arc<Catalog>, bool) {
        if let Some(catalog) = self.catalog.fresh() {
            return (catalog, true);
        }
        self.load_catalog();
        let stand_in = match &self.last_catalog {
            Some(catalog) => Arc::clone(catalog),
            None => Arc::new(self.catalog.fallback_catalog()),
        };
        (stand_in, false)
    }

    fn load_catalog(&mut self) {
        if self.catalog_loading {
            return;
        }
        self.catalog_loading = true;
        let source = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let catalog = source.get_catalog().await;
            if tx.send(PipelineEvent::CatalogLoaded { catalog }).is_err() {
                debug!("Pipeline closed before the catalog loaded");
            }
        });
    }

    /// The snapshot was resolved against a stand-in: re-project with the
    /// loaded catalog and ask for the trait icons it knows about
    fn catalog_arrived(&mut self) {
        let (Some(snapshot), Some(catalog)) = (self.builder.current(), self.last_catalog.as_ref())
        else {
            return;
        };
        if !snapshot.has_occupants()
            || self.connection.state() != ConnectionState::Connected
        {
            return;
        }
        let model = project(Some(snapshot), &self.wanted, catalog);
        let requests = trait_icon_requests(snapshot, catalog);
        if model != self.last_model {
            self.emit_frame(model);
        }
        self.spawn_icon_resolution(self.generation, requests);
    }

    /// Re-run projection for the held snapshot, e.g. after a wanted toggle
    fn reproject(&mut self) {
        let (Some(snapshot), Some(catalog)) = (self.builder.current(), self.last_catalog.as_ref())
        else {
            return;
        };
        if !snapshot.has_occupants()
            || self.connection.state() != ConnectionState::Connected
        {
            return;
        }
        let model = project(Some(snapshot), &self.wanted, catalog);
        self.emit_frame(model);
    }

    fn emit_frame(&mut self, model: RenderModel) {
        self.last_model = model;
        self.renderer.render(RenderUpdate::Frame {
            generation: self.generation,
            model,
        });
    }

    /// Empty shop: hide the overlay, keep the fingerprint
    fn clear_overlay(&mut self) {
        self.generation += 1;
        self.last_model = RenderModel::empty();
        self.renderer.render(RenderUpdate::Cleared {
            generation: self.generation,
        });
    }

    /// Session ended: forget the snapshot and its fingerprint too
    fn clear(&mut self) {
        self.builder.reset();
        self.clear_overlay();
    }

    fn spawn_registration(&self, game_ids: Vec<GameId>, enable: bool) {
        let source = Arc::clone(&self.source);
        let features = self.config.required_features.clone();
        tokio::spawn(async move {
            for game_id in game_ids {
                if let Err(e) = register_features(source.as_ref(), game_id, &features, enable).await
                {
                    warn!("{}", e);
                }
            }
        });
    }

    fn spawn_icon_resolution(&self, generation: u64, requests: Vec<TraitIconRequest>) {
        if requests.is_empty() {
            return;
        }
        let assets = Arc::clone(&self.assets);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let lookups = requests.iter().map(|request| {
                let assets = &assets;
                async move {
                    TraitIcon {
                        slot_index: request.slot_index,
                        trait_name: request.trait_name.clone(),
                        icon: assets
                            .resolve_trait_icon(&request.trait_name, request.hint.as_deref())
                            .await,
                    }
                }
            });
            let icons = join_all(lookups).await;
            if tx
                .send(PipelineEvent::TraitIconsResolved { generation, icons })
                .is_err()
            {
                debug!("Pipeline closed before icons for generation {}", generation);
            }
        });
    }
}

/// Opt in to events and request the feature list for one game
async fn register_features(
    source: &dyn EventSource,
    game_id: GameId,
    features: &[String],
    enable: bool,
) -> Result<(), ShopwatchError> {
    if enable {
        source
            .enable_tracking(game_id)
            .await
            .map_err(|e| ShopwatchError::Registration {
                game_id,
                reason: e.to_string(),
            })?;
    }
    source
        .set_required_features(game_id, features)
        .await
        .map_err(|e| ShopwatchError::Registration {
            game_id,
            reason: e.to_string(),
        })?;
    info!("Registered {} features for game {}", features.len(), game_id);
    Ok(())
}
