//! palm_orbit: interactive entry point.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use palm_orbit::app::run;
use palm_orbit::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "palm_orbit",
    version,
    about = "Steer a 3D object with your hand; the mouse takes over when no hand is visible"
)]
struct Cli {
    /// JSON config file (every key optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulate a blocked camera permission
    #[arg(long)]
    deny_camera: bool,

    /// Simulate a hand model that has not finished loading
    #[arg(long)]
    provider_not_ready: bool,

    /// Override the no-hand grace period (milliseconds)
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Enable camera tracking on launch
    #[arg(long)]
    autostart: bool,
}

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    if cli.deny_camera        { cfg.simulation.deny_camera = true; }
    if cli.provider_not_ready { cfg.simulation.provider_ready = false; }
    if cli.autostart          { cfg.autostart = true; }
    if let Some(ms) = cli.grace_ms {
        cfg.tracking.grace_period_ms = ms;
    }
    cfg.validate().context("invalid configuration")?;

    info!("Mode: simulation (arrows move the hand, O = open palm, C = camera on/off)");
    run(cfg).map_err(|e| anyhow!(e)).context("visualizer failed")
}
