//! End-to-end pipeline behaviour with fake collaborators.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use shopwatch_core::assets::{AssetProbe, AssetSettings};
use shopwatch_core::catalog::{CatalogRemote, CatalogSettings};
use shopwatch_core::{
    AssetResolver, CatalogSource, ChannelRenderer, ConnectionState, CostTier, EventSource,
    FallbackTable, GameId, MemoryStore, Pipeline, PipelineEvent, RawFeatureUpdate,
    RenderUpdate, ShopwatchConfig, WantedSet,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const TFT: GameId = 21570;
const BASE: &str = "https://cdn.example/game/";

const SHOP: &str = r#"{"slot_1":{"name":"Sold"},"slot_2":{"name":"TFT16_Jhin"},"slot_3":{"name":"TFT16_Lux"},"slot_4":{"name":"TFT16_KogMaw"},"slot_5":{"name":"TFT16_Azir"}}"#;

// ============================================================================
// Fakes
// ============================================================================

struct OfflineRemote;

#[async_trait]
impl CatalogRemote for OfflineRemote {
    async fn fetch_content_set_definition(&self) -> Result<Value> {
        Err(anyhow!("offline"))
    }
}

struct DocumentRemote(Value);

#[async_trait]
impl CatalogRemote for DocumentRemote {
    async fn fetch_content_set_definition(&self) -> Result<Value> {
        Ok(self.0.clone())
    }
}

/// Serves a set 16 document after `delay`
struct SlowRemote {
    delay: Duration,
    finished: AtomicBool,
}

#[async_trait]
impl CatalogRemote for SlowRemote {
    async fn fetch_content_set_definition(&self) -> Result<Value> {
        tokio::time::sleep(self.delay).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(json!({
            "setData": [{
                "mutator": "TFTSet16",
                "champions": [
                    { "apiName": "TFT16_Jhin", "name": "Jhin", "cost": 4, "traits": ["Deadeye"] },
                    { "apiName": "TFT16_Zed", "name": "Zed", "cost": 3, "traits": ["Assassin"] }
                ],
                "traits": []
            }]
        }))
    }
}

/// Every URL loads; URLs containing `slow_token` take `delay` to answer
struct SlowProbe {
    slow_token: &'static str,
    delay: Duration,
}

#[async_trait]
impl AssetProbe for SlowProbe {
    async fn probe(&self, url: &str) -> bool {
        if url.contains(self.slow_token) {
            tokio::time::sleep(self.delay).await;
        }
        true
    }
}

#[derive(Default)]
struct FakeSource {
    running: AtomicBool,
    info: Mutex<HashMap<GameId, Value>>,
    info_queries: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for FakeSource {
    async fn enable_tracking(&self, game_id: GameId) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("enable_tracking:{}", game_id));
        Ok(())
    }

    async fn set_required_features(&self, game_id: GameId, features: &[String]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("set_required_features:{}:{}", game_id, features.len()));
        Ok(())
    }

    async fn get_info(&self, game_id: GameId) -> Result<Option<Value>> {
        self.info_queries.fetch_add(1, Ordering::SeqCst);
        if !self.running.load(Ordering::SeqCst) {
            return Err(anyhow!("game not running"));
        }
        Ok(self.info.lock().unwrap().get(&game_id).cloned())
    }
}

fn fallback() -> Arc<FallbackTable> {
    Arc::new(FallbackTable::from_pairs([
        ("TFT16_Jhin", 4),
        ("TFT16_Lux", 2),
        ("TFT16_Kog'Maw", 1),
        ("TFT16_Azir", 5),
    ]))
}

fn build(
    remote: Arc<dyn CatalogRemote>,
    probe: Arc<dyn AssetProbe>,
    source: Arc<dyn EventSource>,
) -> (Pipeline, UnboundedReceiver<RenderUpdate>) {
    let config = ShopwatchConfig {
        tracked_games: vec![TFT],
        set_number: 16,
        asset_base: BASE.to_string(),
        asset_versions: vec![16],
        ..ShopwatchConfig::default()
    };
    let catalog = Arc::new(CatalogSource::new(
        remote,
        fallback(),
        CatalogSettings {
            set_number: 16,
            asset_base: BASE.to_string(),
            ttl: Duration::from_secs(3600),
            fallback_retry: Duration::from_secs(60),
        },
    ));
    let assets = Arc::new(AssetResolver::new(
        probe,
        AssetSettings {
            asset_base: BASE.to_string(),
            versions: vec![16],
        },
    ));
    let wanted = WantedSet::load(Arc::new(MemoryStore::new()));
    let (renderer, rx) = ChannelRenderer::new();
    let pipeline = Pipeline::new(config, catalog, assets, wanted, source, Box::new(renderer));
    (pipeline, rx)
}

fn offline() -> (Pipeline, UnboundedReceiver<RenderUpdate>) {
    build(
        Arc::new(OfflineRemote),
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        Arc::new(FakeSource::default()),
    )
}

fn shop(raw: &str) -> PipelineEvent {
    PipelineEvent::FeatureUpdate {
        game_id: TFT,
        update: RawFeatureUpdate::shop_pieces(raw),
    }
}

fn shop_of(name: &str) -> String {
    format!(r#"{{"slot_1":{{"name":"{}"}}}}"#, name)
}

/// Next frame or clear, skipping icon updates
async fn next_view(rx: &mut UnboundedReceiver<RenderUpdate>) -> RenderUpdate {
    loop {
        match rx.recv().await {
            Some(RenderUpdate::TraitIcons { .. }) => continue,
            Some(update) => return update,
            None => panic!("renderer channel closed"),
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_shop_projection_and_wanted_toggle() {
    let (mut pipeline, mut rx) = offline();

    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    assert_eq!(pipeline.session().state, ConnectionState::Connected);
    assert_eq!(pipeline.session().active_id, Some(TFT));

    pipeline.handle_event(shop(SHOP)).await;
    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert!(!model.slots[0].occupied);
    let tiers: Vec<Option<CostTier>> = model.slots[1..].iter().map(|s| s.cost_tier).collect();
    assert_eq!(
        tiers,
        vec![
            Some(CostTier::Known(4)),
            Some(CostTier::Known(2)),
            Some(CostTier::Known(1)),
            Some(CostTier::Known(5)),
        ]
    );
    assert!(model.slots.iter().all(|s| !s.is_wanted));

    // No new telemetry: toggling alone re-projects
    pipeline
        .handle_event(PipelineEvent::ToggleWanted {
            id: "TFT16_Lux".to_string(),
        })
        .await;
    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert!(model.slots[2].is_wanted);
    assert_eq!(model.slots.iter().filter(|s| s.is_wanted).count(), 1);
    assert_eq!(pipeline.current_model(), model);

    pipeline
        .handle_event(PipelineEvent::ToggleWanted {
            id: "TFT16_Lux".to_string(),
        })
        .await;
    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert!(!model.slots[2].is_wanted);
}

#[tokio::test]
async fn test_duplicate_payload_yields_one_snapshot() {
    let (mut pipeline, mut rx) = offline();
    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;

    pipeline.handle_event(shop(SHOP)).await;
    pipeline.handle_event(shop(SHOP)).await;

    assert!(matches!(
        rx.recv().await,
        Some(RenderUpdate::Frame { generation: 1, .. })
    ));
    assert!(rx.try_recv().is_err());
    assert_eq!(pipeline.generation(), 1);
}

#[tokio::test]
async fn test_exit_clears_and_accepts_same_payload_again() {
    let (mut pipeline, mut rx) = offline();
    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    pipeline.handle_event(shop(SHOP)).await;
    assert!(matches!(next_view(&mut rx).await, RenderUpdate::Frame { .. }));

    pipeline
        .handle_event(PipelineEvent::GameExit { game_id: TFT })
        .await;
    assert!(matches!(next_view(&mut rx).await, RenderUpdate::Cleared { .. }));
    assert!(pipeline.current_model().is_empty());
    assert_eq!(pipeline.session().state, ConnectionState::Idle);
    assert_eq!(pipeline.session().active_id, None);

    // Updates after exit are gated
    pipeline.handle_event(shop(SHOP)).await;
    assert!(rx.try_recv().is_err());

    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    pipeline.handle_event(shop(SHOP)).await;
    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert_eq!(model.occupied_count(), 4);
}

#[tokio::test]
async fn test_all_sold_clears_overlay() {
    let (mut pipeline, mut rx) = offline();
    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    pipeline.handle_event(shop(SHOP)).await;
    next_view(&mut rx).await;

    pipeline
        .handle_event(shop(r#"{"slot_1":{"name":"Sold"},"slot_2":{"name":"Sold"}}"#))
        .await;
    assert!(matches!(next_view(&mut rx).await, RenderUpdate::Cleared { .. }));
    assert!(pipeline.current_model().is_empty());
}

#[tokio::test]
async fn test_elevation_blocks_attachment() {
    let (mut pipeline, mut rx) = offline();
    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    pipeline
        .handle_event(PipelineEvent::ElevationRequired { game_id: TFT })
        .await;
    assert!(matches!(next_view(&mut rx).await, RenderUpdate::Cleared { .. }));

    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    assert_eq!(pipeline.session().state, ConnectionState::ElevationBlocked);
    assert_eq!(pipeline.session().active_id, None);
}

#[tokio::test]
async fn test_untracked_elevation_leaves_tracking_alone() {
    let (mut pipeline, mut rx) = offline();
    pipeline
        .handle_event(PipelineEvent::ElevationRequired { game_id: 5426 })
        .await;
    assert_eq!(pipeline.session().state, ConnectionState::Idle);

    pipeline
        .handle_event(PipelineEvent::GameDetected { game_id: TFT })
        .await;
    assert_eq!(pipeline.session().state, ConnectionState::Connected);
    assert_eq!(pipeline.session().active_id, Some(TFT));

    pipeline.handle_event(shop(SHOP)).await;
    assert!(matches!(next_view(&mut rx).await, RenderUpdate::Frame { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_slow_catalog_does_not_hold_the_queue() {
    let remote = Arc::new(SlowRemote {
        delay: Duration::from_secs(10),
        finished: AtomicBool::new(false),
    });
    let (mut pipeline, mut rx) = build(
        remote.clone(),
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        Arc::new(FakeSource::default()),
    );
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    handle.send(PipelineEvent::GameDetected { game_id: TFT });
    handle.send(shop(SHOP));
    handle.send(PipelineEvent::GameExit { game_id: TFT });

    let views = tokio::time::timeout(Duration::from_secs(1), async {
        let frame = next_view(&mut rx).await;
        let cleared = next_view(&mut rx).await;
        (frame, cleared)
    })
    .await
    .expect("exit was stuck behind the catalog fetch");
    let model = match views {
        (RenderUpdate::Frame { model, .. }, RenderUpdate::Cleared { .. }) => model,
        other => panic!("expected a frame then a clear, got {:?}", other),
    };
    // Resolved from the bundled table while the remote is still loading
    assert_eq!(model.slots[1].cost_tier, Some(CostTier::Known(4)));
    assert!(!remote.finished.load(Ordering::SeqCst));

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.session().state, ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_late_catalog_upgrades_the_held_snapshot() {
    let remote = Arc::new(SlowRemote {
        delay: Duration::from_secs(3),
        finished: AtomicBool::new(false),
    });
    let (mut pipeline, mut rx) = build(
        remote,
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        Arc::new(FakeSource::default()),
    );
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    handle.send(PipelineEvent::GameDetected { game_id: TFT });
    handle.send(shop(&shop_of("TFT16_Zed")));

    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert_eq!(model.slots[0].cost_tier, Some(CostTier::Unknown));

    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a re-projected frame");
    };
    assert_eq!(model.slots[0].cost_tier, Some(CostTier::Known(3)));

    let icons = loop {
        match rx.recv().await {
            Some(RenderUpdate::TraitIcons { icons, .. }) => break icons,
            Some(_) => continue,
            None => panic!("renderer channel closed"),
        }
    };
    assert_eq!(icons[0].trait_name, "Assassin");

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_latest_snapshot_wins_over_delayed_icons() {
    let document = json!({
        "setData": [{
            "mutator": "TFTSet16",
            "champions": [
                { "apiName": "TFT16_Jhin", "name": "Jhin", "cost": 4, "traits": ["Deadeye"] },
                { "apiName": "TFT16_Lux", "name": "Lux", "cost": 2, "traits": ["Arcana"] }
            ],
            "traits": []
        }]
    });
    let (mut pipeline, mut rx) = build(
        Arc::new(DocumentRemote(document)),
        Arc::new(SlowProbe {
            slow_token: "deadeye",
            delay: Duration::from_millis(500),
        }),
        Arc::new(FakeSource::default()),
    );
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    handle.send(PipelineEvent::GameDetected { game_id: TFT });
    // Let the catalog load kicked off by the detection land first
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.send(shop(&shop_of("TFT16_Jhin")));
    handle.send(shop(&shop_of("TFT16_Lux")));

    let mut icon_updates = Vec::new();
    let mut last_frame = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while let Ok(Some(update)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        match update {
            RenderUpdate::TraitIcons { generation, icons } => {
                icon_updates.push((generation, icons))
            }
            RenderUpdate::Frame { generation, model } => last_frame = Some((generation, model)),
            RenderUpdate::Cleared { .. } => panic!("unexpected clear"),
        }
    }

    let (generation, model) = last_frame.expect("no frame rendered");
    assert_eq!(generation, 2);
    assert_eq!(model.slots[0].cost_tier, Some(CostTier::Known(2)));

    assert_eq!(icon_updates.len(), 1, "stale icons must be dropped");
    let (generation, icons) = &icon_updates[0];
    assert_eq!(*generation, 2);
    assert_eq!(icons[0].trait_name, "Arcana");

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.generation(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_attaches_running_game_and_replays_shop() {
    let source = Arc::new(FakeSource::default());
    source.running.store(true, Ordering::SeqCst);
    source
        .info
        .lock()
        .unwrap()
        .insert(TFT, json!({ "res": { "store": { "shop_pieces": SHOP } } }));

    let (mut pipeline, mut rx) = build(
        Arc::new(OfflineRemote),
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        source.clone(),
    );
    pipeline.start();
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    let RenderUpdate::Frame { model, .. } = next_view(&mut rx).await else {
        panic!("expected a frame");
    };
    assert_eq!(model.occupied_count(), 4);

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.session().active_id, Some(TFT));
    assert_eq!(source.info_queries.load(Ordering::SeqCst), 1);

    let calls = source.calls();
    assert!(calls.contains(&"set_required_features:21570:6".to_string()));
    assert!(calls.contains(&"enable_tracking:21570".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_retries_until_game_appears() {
    let source = Arc::new(FakeSource::default());
    source
        .info
        .lock()
        .unwrap()
        .insert(TFT, json!({ "res": { "game_info": {} } }));

    let (mut pipeline, _rx) = build(
        Arc::new(OfflineRemote),
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        source.clone(),
    );
    pipeline.start();
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    // First probe at 1.5s misses, next one is due at 6.5s
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(source.info_queries.load(Ordering::SeqCst), 1);
    source.running.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(source.info_queries.load(Ordering::SeqCst), 2);

    // Attached: no further probing
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.info_queries.load(Ordering::SeqCst), 2);

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.session().state, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_live_detection_preempts_reconcile() {
    let source = Arc::new(FakeSource::default());
    let (mut pipeline, _rx) = build(
        Arc::new(OfflineRemote),
        Arc::new(SlowProbe {
            slow_token: "never",
            delay: Duration::ZERO,
        }),
        source.clone(),
    );
    pipeline.start();
    let handle = pipeline.handle();
    let task = tokio::spawn(async move {
        pipeline.run().await;
        pipeline
    });

    handle.send(PipelineEvent::GameDetected { game_id: TFT });
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(source.info_queries.load(Ordering::SeqCst), 0);

    handle.send(PipelineEvent::Shutdown);
    let pipeline = task.await.unwrap();
    assert_eq!(pipeline.session().active_id, Some(TFT));
}
