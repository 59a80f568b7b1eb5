use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use homestead::{
    engine::Engine,
    save,
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Homestead settlement simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/frontier.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override wall seconds per tick
    #[arg(long)]
    dt: Option<f64>,

    /// Override snapshot interval in ticks
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Resume from a save file instead of generating a new world
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write a save file when the run finishes
    #[arg(long)]
    save: Option<PathBuf>,

    /// Serve read-only frames over HTTP while the simulation runs
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(dt) = cli.dt {
        scenario.dt_seconds = dt;
    }
    if let Some(interval) = cli.snapshot_interval {
        scenario.snapshot_interval_ticks = interval;
    }
    let ticks = scenario.ticks(cli.ticks);
    let snapshot_dir = cli
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));

    let mut world = match &cli.load {
        Some(path) => {
            let loaded = save::load_from_path(path, &scenario)?;
            if !loaded.issues.is_empty() {
                warn!(issues = loaded.issues.len(), "save needed repairs");
            }
            loaded.settlement
        }
        None => scenario.build_world(),
    };
    let settings = scenario.engine_settings(snapshot_dir);

    if cli.serve {
        if cli.save.is_some() {
            warn!("--save is ignored while serving");
        }
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(web::run(WebServerConfig {
            world,
            settings,
            ticks,
            host: cli.host,
            port: cli.port,
        }));
    }

    let mut engine = Engine::standard(settings);
    engine.run(&mut world, ticks)?;
    info!(
        scenario = %scenario.name,
        ticks,
        day = world.day(),
        clock = %world.clock().label(),
        alive = world.alive_count(),
        wood = world.inventory().wood,
        stone = world.inventory().stone,
        food = world.inventory().food,
        "run complete"
    );

    if let Some(path) = &cli.save {
        save::save_to_path(&world, path)?;
    }
    Ok(())
}
