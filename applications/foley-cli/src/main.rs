/// Foley - interactive soundboard player
use anyhow::Context;
use clap::{Parser, Subcommand};
use foley_audio_desktop::{DesktopOutput, DeviceInfo};
use foley_cli::{Board, Command, Registry, Triggered};
use foley_core::{EngineConfig, ResolvedGroup, Variant};
use foley_playback::{build_graph, Engine};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG: &str = "foley.toml";

#[derive(Parser)]
#[command(name = "foley")]
#[command(about = "Soundboard player for Foley board files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the groups of a board
    Groups {
        /// Board file
        #[arg(short, long)]
        board: PathBuf,
    },
    /// Play a board, reading commands from stdin
    Run {
        /// Board file
        #[arg(short, long)]
        board: PathBuf,
        /// Engine configuration file (defaults to ./foley.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Route new sounds through reverb
        #[arg(long)]
        cave: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foley=info,foley_cli=info,foley_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Groups { board } => list_groups(&board),
        Commands::Run {
            board,
            config,
            cave,
        } => run(&board, config, cave).await,
    }
}

fn describe(group: &ResolvedGroup) -> String {
    match (&group.variant, &group.sequence) {
        (Variant::Sequence, Some(steps)) => format!("{} steps", steps.len()),
        _ => format!("{} effects", group.effects.len()),
    }
}

fn list_groups(path: &Path) -> anyhow::Result<()> {
    let board = Board::load(path)?;
    if board.is_empty() {
        println!("No groups in {}", path.display());
        return Ok(());
    }
    for group in board.iter() {
        println!(
            "{:<20} {:<11} {:<12} {}",
            group.id.as_str(),
            group.variant.as_str(),
            describe(group),
            group.name
        );
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<EngineConfig> {
    let path = path.or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    });
    let mut config = EngineConfig::load(path.as_deref()).context("loading engine configuration")?;

    let device = DeviceInfo::default_output().context("querying the default output device")?;
    if device.sample_rate != config.sample_rate {
        warn!(
            configured = config.sample_rate,
            device = device.sample_rate,
            "Using the device sample rate"
        );
        config.sample_rate = device.sample_rate;
    }
    Ok(config)
}

async fn run(board_path: &Path, config: Option<PathBuf>, cave: bool) -> anyhow::Result<()> {
    let board = Board::load(board_path)?;
    let config = load_config(config)?;

    let graph = build_graph(&config).context("building the mixing graph")?;
    let engine = Engine::new(config, graph.clone())?;
    engine.routing().set_cave(cave);
    let _output = DesktopOutput::start(graph).context("starting audio output")?;

    info!(
        board = %board_path.display(),
        groups = board.len(),
        cave,
        "Ready; type a group id, or: stop <group>, stop-all, volume <group> <0..1>, cave on|off, list, quit"
    );

    let registry = Registry::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(err)) => {
                eprintln!("{err}");
                continue;
            }
        };

        match command {
            Command::Trigger(group) => match registry.trigger(&engine, &board, &group) {
                Ok(Triggered::Started(container)) => {
                    info!(group = %group, container = %container.id(), "Started");
                }
                Ok(Triggered::Toggled) => info!(group = %group, "Stopping"),
                Err(err) => eprintln!("{err:#}"),
            },
            Command::Stop(group) => registry.stop(&group),
            Command::StopAll => registry.stop_all(),
            Command::Volume(group, level) => registry.set_volume(&group, level),
            Command::Cave(on) => {
                engine.routing().set_cave(on);
                info!(cave = on, "Routing changed for new sounds");
            }
            Command::List => {
                for (group, count) in registry.active_groups() {
                    println!("{:<20} {count} playing", group.as_str());
                }
            }
            Command::Quit => break,
        }
    }

    registry.stop_all();
    // Let fade-outs finish before the graph goes silent
    tokio::time::sleep(engine.config().soundtrack_stop_fade()).await;
    engine.close();
    info!("Bye");
    Ok(())
}
