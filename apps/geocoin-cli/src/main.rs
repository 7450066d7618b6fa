use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use geocoin_common::LatLng;
use geocoin_input::Command;
use geocoin_kernel::{cell_luck, coin_count_for};
use geocoin_persist::{FileStore, KeyValueStore, PersistedSession};
use geocoin_session::{CommandOutcome, DropOutcome, Engine, GameConfig, PickUpOutcome};
use geocoin_stream::GridIndex;

#[derive(Parser)]
#[command(name = "geocoin-cli", about = "CLI tool for the geocoin cache world")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file overriding the default game configuration
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions and the effective configuration
    Info,
    /// List the caches that spawn around a point, without touching any save
    Scan {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Radius in cells (defaults to the visibility radius)
        #[arg(short, long)]
        radius: Option<u32>,
    },
    /// Resume the saved session, apply commands in order, and save
    Play {
        /// Session data directory
        #[arg(long, default_value = "./geocoin_data")]
        data_dir: PathBuf,
        /// Commands: n s e w, move:DLAT,DLNG, goto:LAT,LNG, pickup:I,J,SERIAL,
        /// drop:I,J,SERIAL, center:I,J, reset
        #[arg(allow_hyphen_values = true)]
        commands: Vec<Command>,
    },
    /// Summarize the saved session
    Status {
        /// Session data directory
        #[arg(long, default_value = "./geocoin_data")]
        data_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => GameConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => GameConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("geocoin-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("persist: {}", geocoin_persist::crate_info());
            println!("stream: {}", geocoin_stream::crate_info());
            println!("config: {}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Scan { lat, lng, radius } => {
            let center = LatLng::new(
                lat.unwrap_or(config.origin.lat),
                lng.unwrap_or(config.origin.lng),
            );
            let radius = radius.unwrap_or(config.visibility_radius);
            let mut grid = GridIndex::new(config.tile_width);
            let cells = grid.cells_near(center, radius);
            println!(
                "Scan around {center} (cell {}), radius {radius}: {} cells",
                grid.cell_for_point(center),
                cells.len()
            );
            let mut caches = 0;
            for cell in cells {
                let luck = cell_luck(cell);
                if luck < config.cache_probability {
                    caches += 1;
                    let coins = coin_count_for(luck, config.coin_scale_factor);
                    println!("  cache {:>18}  coins={coins:<2}  luck={luck:.6}", cell.to_string());
                }
            }
            println!("{caches} caches");
        }
        Commands::Play { data_dir, commands } => {
            let store = FileStore::open(&data_dir)
                .with_context(|| format!("opening {}", data_dir.display()))?;
            let mut engine = Engine::start(config, store)?;
            for command in commands {
                let outcome = engine.apply(command)?;
                println!("{command}: {}", describe(&outcome));
                for event in engine.drain_events() {
                    tracing::debug!(?event, "world event");
                }
            }
            engine.save()?;
            tracing::info!(data_dir = %data_dir.display(), "session saved");
            print_engine(&engine);
        }
        Commands::Status { data_dir } => {
            let store = FileStore::open(&data_dir)
                .with_context(|| format!("opening {}", data_dir.display()))?;
            match store.load(&config.storage_key)? {
                None => println!("No saved session in {}", data_dir.display()),
                Some(text) => {
                    let sealed = PersistedSession::decode(&text)?;
                    let session = &sealed.session;
                    println!("Saved session (schema v{})", sealed.version);
                    println!("  position: {}", session.player_position);
                    println!("  path: {} points", session.player_path.len());
                    println!("  inventory: {} coins", session.player_coins.len());
                    println!("  caches: {}", session.caches.len());
                    println!("  coins in circulation: {}", session.coin_total());
                }
            }
        }
    }

    Ok(())
}

fn describe(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Moved(delta) => format!(
            "moved ({} cells entered, {} exited)",
            delta.entered.len(),
            delta.exited.len()
        ),
        CommandOutcome::PickUp(PickUpOutcome::PickedUp(coin)) => format!("picked up {coin}"),
        CommandOutcome::PickUp(PickUpOutcome::NoCache) => "no cache here".into(),
        CommandOutcome::PickUp(PickUpOutcome::CoinNotFound) => "coin not found".into(),
        CommandOutcome::Drop(DropOutcome::Dropped(coin)) => format!("dropped {coin}"),
        CommandOutcome::Drop(DropOutcome::NoCache) => "no cache here".into(),
        CommandOutcome::Drop(DropOutcome::CoinNotFound) => "coin not in inventory".into(),
        CommandOutcome::Center(point) => format!("center at {point}"),
        CommandOutcome::Reset => "session reset".into(),
    }
}

fn print_engine<S: KeyValueStore>(engine: &Engine<S>) {
    println!(
        "Player at {} (cell {}), {} steps taken",
        engine.position(),
        engine.player_cell(),
        engine.path().len()
    );
    println!("Visible caches:");
    for cache in engine.live_caches() {
        let cell = cache.cell();
        let marker = if engine.is_player_at(cell.i, cell.j) { "*" } else { " " };
        let coins: Vec<String> = cache.coins().iter().map(|c| c.to_string()).collect();
        println!("  {marker}{:>18}  [{}]", cell.to_string(), coins.join(", "));
    }
    let inventory: Vec<String> = engine.inventory().iter().map(|c| c.to_string()).collect();
    println!("Inventory: [{}]", inventory.join(", "));
}
