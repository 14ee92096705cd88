// ============================================================================
// shopwatch - developer CLI for the shop telemetry pipeline
// ============================================================================
// Usage:
//   shopwatch resolve TFT16_Jhin TFT16_KogMaw   Resolve ids to cost tiers
//   shopwatch catalog --limit 20                Show the active catalog
//   shopwatch icon Deadeye                      Resolve a trait icon
//   shopwatch wanted toggle TFT16_Jhin          Edit the persisted wanted set
//   shopwatch replay events.jsonl               Feed recorded events through
//                                               the pipeline
// ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde_json::Value;
use shopwatch_core::assets::{AssetProbe, AssetResolver, HttpAssetProbe};
use shopwatch_core::catalog::{
    resolve_cost_traced, CatalogRemote, CatalogSource, FallbackTable, HttpCatalogRemote,
};
use shopwatch_core::{
    ChannelRenderer, GameSession, IconRef, MemoryStore, NullEventSource, OpaqueStore, Pipeline,
    PipelineEvent, RedbStore, RenderUpdate, ShopwatchConfig, WantedSet,
};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Shop telemetry pipeline tools
#[derive(Parser)]
#[command(name = "shopwatch", version, about = "Inspect and drive the shop telemetry pipeline")]
struct Cli {
    /// Path to the store file (default: ~/.shopwatch/store.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Keep the wanted set in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve shop ids to cost tiers
    Resolve {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Skip the remote catalog and use the bundled table
        #[arg(long)]
        offline: bool,
    },

    /// Show the catalog the pipeline would use
    Catalog {
        #[arg(long)]
        offline: bool,

        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Resolve a trait icon URL
    Icon {
        /// Trait display name, e.g. "Dark Star"
        name: String,

        /// Icon path or URL from the catalog, tried after the known layouts
        #[arg(long)]
        hint: Option<String>,
    },

    /// Edit the persisted wanted set
    Wanted {
        #[command(subcommand)]
        action: WantedAction,
    },

    /// Feed a JSON-lines file of pipeline events through the pipeline
    Replay {
        file: String,

        #[arg(long)]
        offline: bool,

        /// Wait this long after the last event for icon results
        #[arg(long, default_value = "0")]
        settle_ms: u64,
    },
}

#[derive(Subcommand)]
enum WantedAction {
    List,
    Add { id: String },
    Remove { id: String },
    Toggle { id: String },
}

/// Remote that always fails, forcing the bundled fallback
struct OfflineRemote;

#[async_trait]
impl CatalogRemote for OfflineRemote {
    async fn fetch_content_set_definition(&self) -> Result<Value> {
        Err(anyhow!("offline mode"))
    }
}

/// Probe that never loads anything, so every icon is a placeholder
struct OfflineProbe;

#[async_trait]
impl AssetProbe for OfflineProbe {
    async fn probe(&self, _url: &str) -> bool {
        false
    }
}

fn init_logging() {
    let filter = EnvFilter::from_default_env().add_directive(
        "shopwatch_core=debug"
            .parse()
            .unwrap_or_else(|_| tracing::Level::INFO.into()),
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn catalog_source(config: &ShopwatchConfig, offline: bool) -> Arc<CatalogSource> {
    let remote: Arc<dyn CatalogRemote> = if offline {
        Arc::new(OfflineRemote)
    } else {
        Arc::new(HttpCatalogRemote::new(
            config.catalog_url.clone(),
            config.catalog_timeout(),
        ))
    };
    Arc::new(CatalogSource::new(
        remote,
        FallbackTable::bundled(),
        config.catalog_settings(),
    ))
}

fn asset_resolver(config: &ShopwatchConfig, offline: bool) -> Arc<AssetResolver> {
    let probe: Arc<dyn AssetProbe> = if offline {
        Arc::new(OfflineProbe)
    } else {
        Arc::new(HttpAssetProbe::new(config.probe_timeout()))
    };
    Arc::new(AssetResolver::new(probe, config.asset_settings()))
}

fn open_store(cli_path: Option<&str>, config: &ShopwatchConfig, ephemeral: bool) -> Result<Arc<dyn OpaqueStore>> {
    if ephemeral {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = match cli_path {
        Some(path) => PathBuf::from(path),
        None => config.store_path()?,
    };
    Ok(Arc::new(RedbStore::open(path)?))
}

fn describe_session(session: &GameSession) -> String {
    match session.active_id {
        Some(id) => format!("{:?} (game {})", session.state, id),
        None => format!("{:?}", session.state),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let config = ShopwatchConfig::default();

    match cli.command {
        Commands::Resolve { ids, offline } => cmd_resolve(&config, &ids, offline).await,
        Commands::Catalog { offline, limit } => cmd_catalog(&config, offline, limit).await,
        Commands::Icon { name, hint } => cmd_icon(&config, &name, hint.as_deref()).await,
        Commands::Wanted { action } => {
            let store = open_store(cli.db_path.as_deref(), &config, cli.ephemeral)?;
            cmd_wanted(store, action)
        }
        Commands::Replay {
            file,
            offline,
            settle_ms,
        } => {
            let store = open_store(cli.db_path.as_deref(), &config, cli.ephemeral)?;
            cmd_replay(config, store, &file, offline, settle_ms).await
        }
    }
}

async fn cmd_resolve(config: &ShopwatchConfig, ids: &[String], offline: bool) -> Result<()> {
    let source = catalog_source(config, offline);
    let catalog = source.get_catalog().await;
    let fallback = source.fallback_table();

    println!("{:<28}  {:<4}  {:<8}  {}", "ID", "COST", "COLOUR", "MATCHED BY");
    println!("{}", "-".repeat(70));
    let mut unresolved = 0;
    for id in ids {
        let (tier, path) = resolve_cost_traced(id, &catalog, &fallback);
        if !tier.is_known() {
            unresolved += 1;
        }
        println!(
            "{:<28}  {:<4}  {:<8}  {:?}",
            id,
            tier.to_string(),
            tier.color_hex(),
            path
        );
    }
    if unresolved > 0 {
        println!();
        println!("{} of {} ids unresolved", unresolved, ids.len());
    }
    Ok(())
}

async fn cmd_catalog(config: &ShopwatchConfig, offline: bool, limit: Option<usize>) -> Result<()> {
    let source = catalog_source(config, offline);
    let catalog = source.get_catalog().await;

    println!("=== Catalog (set {}) ===", catalog.set_number());
    println!("Origin:  {:?}", catalog.origin());
    println!("Entries: {}", catalog.len());
    println!();

    for entry in catalog.entries().take(limit.unwrap_or(usize::MAX)) {
        let traits = entry
            .traits
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<28}  {:>2}  {:<20}  {}",
            entry.id,
            entry.cost,
            entry.display_name,
            if traits.is_empty() { "-" } else { traits.as_str() }
        );
    }
    Ok(())
}

async fn cmd_icon(config: &ShopwatchConfig, name: &str, hint: Option<&str>) -> Result<()> {
    let resolver = asset_resolver(config, false);
    match resolver.resolve_trait_icon(name, hint).await {
        IconRef::Remote(url) => println!("{}", url),
        IconRef::Placeholder(letter) => println!("(placeholder '{}')", letter),
    }
    Ok(())
}

fn cmd_wanted(store: Arc<dyn OpaqueStore>, action: WantedAction) -> Result<()> {
    let mut wanted = WantedSet::load(store);

    match action {
        WantedAction::List => {
            if wanted.is_empty() {
                println!("No wanted champions.");
            }
            for id in wanted.ids() {
                println!("{}", id);
            }
            return Ok(());
        }
        WantedAction::Add { id } => {
            if wanted.add(&id) {
                println!("Added {}", id);
            } else {
                println!("{} is already wanted", id);
            }
        }
        WantedAction::Remove { id } => {
            if wanted.remove(&id) {
                println!("Removed {}", id);
            } else {
                println!("{} was not wanted", id);
            }
        }
        WantedAction::Toggle { id } => {
            let now = wanted.toggle(&id);
            println!("{} {}", id, if now { "is now wanted" } else { "is no longer wanted" });
        }
    }
    wanted.save()?;
    Ok(())
}

async fn cmd_replay(
    config: ShopwatchConfig,
    store: Arc<dyn OpaqueStore>,
    file: &str,
    offline: bool,
    settle_ms: u64,
) -> Result<()> {
    let handle = std::fs::File::open(file).map_err(|e| anyhow!("Failed to open {}: {}", file, e))?;

    let catalog = catalog_source(&config, offline);
    let assets = asset_resolver(&config, offline);
    let (renderer, mut updates) = ChannelRenderer::new();
    let mut pipeline = Pipeline::new(
        config,
        catalog,
        assets,
        WantedSet::load(store),
        Arc::new(NullEventSource),
        Box::new(renderer),
    );

    let print_updates = |updates: &mut tokio::sync::mpsc::UnboundedReceiver<RenderUpdate>| {
        while let Ok(update) = updates.try_recv() {
            match serde_json::to_string(&update) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!("Failed to serialize render update: {}", e),
            }
        }
    };

    let mut last_session = describe_session(pipeline.session());
    println!("# session: {}", last_session);

    for (number, line) in BufReader::new(handle).lines().enumerate() {
        let line = line.map_err(|e| anyhow!("Failed to read {}: {}", file, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let event: PipelineEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Skipping line {}: {}", number + 1, e);
                continue;
            }
        };

        let keep_going = pipeline.handle_event(event).await;
        pipeline.process_pending().await;
        print_updates(&mut updates);

        let session = describe_session(pipeline.session());
        if session != last_session {
            println!("# session: {}", session);
            last_session = session;
        }
        if !keep_going {
            break;
        }
    }

    if settle_ms > 0 {
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        pipeline.process_pending().await;
        print_updates(&mut updates);
    }

    let model = pipeline.current_model();
    println!(
        "# final: {} occupied, {} wanted, generation {}",
        model.occupied_count(),
        model.slots.iter().filter(|s| s.is_wanted).count(),
        pipeline.generation()
    );
    Ok(())
}
