//! Headless spear simulation driver.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use spear_pipeline::prelude::*;
use tracing_subscriber::EnvFilter;

/// Run the mob and spear pipeline against a walled scene
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (JSON); missing fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial mob count
    #[arg(short, long, default_value_t = 1000)]
    mobs: i64,

    /// Population change applied halfway through the run (e.g. -100, 1000)
    #[arg(long, allow_hyphen_values = true)]
    change: Option<i64>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Fixed tick delta in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,

    /// Z coordinate of the wall between the crowd and the target
    #[arg(long, default_value_t = 30.0)]
    wall_z: f32,

    /// Print the stage profile of the last tick
    #[arg(long)]
    profile: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // Only fails if a subscriber is already installed
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn build_scene(settings: &SimSettings, wall_z: f32) -> StaticScene {
    StaticScene::new().with_box(
        Vec3::new(settings.target_left * 2.0, 0.0, wall_z),
        Vec3::new(settings.target_right * 2.0, 4.0, wall_z + 1.0),
        settings.wall_layer,
    )
}

fn run(args: &Args) -> Result<()> {
    let settings = match &args.config {
        Some(path) => SimSettings::from_path(path)?,
        None => SimSettings::default(),
    };
    let scene = build_scene(&settings, args.wall_z);
    let mut target = TargetOscillator::from_settings(&settings);
    let mut sim = Simulation::new(settings, scene)?;

    let change = sim.set_mob_count(args.mobs);
    tracing::info!(
        mobs = sim.mob_count(),
        spears = sim.spear_count(),
        ?change,
        "population ready"
    );

    let started = Instant::now();
    let mut thrown = 0;
    let mut returned = 0;
    let mut skipped = 0;
    for tick in 0..args.ticks {
        if tick == args.ticks / 2 {
            if let Some(delta) = args.change {
                let change = sim.set_mob_count(delta);
                tracing::info!(tick, delta, mobs = sim.mob_count(), ?change, "population changed");
            }
        }

        let report = sim.tick(args.dt, target.advance(args.dt));
        thrown += report.spears_thrown;
        returned += report.spears_returned;
        if report.skipped.is_some() {
            skipped += 1;
        }
        tracing::debug!(?report, "tick");
    }

    let (parked, starting, flying) = sim.spears().census();
    tracing::info!(
        ticks = args.ticks,
        elapsed = ?started.elapsed(),
        thrown,
        returned,
        skipped,
        spears_in_use = sim.spear_pool().in_use(),
        parked,
        starting,
        flying,
        "run finished"
    );

    if args.profile {
        sim.pipeline().print_profile();
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.json);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
