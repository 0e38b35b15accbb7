//! Tether Satellite: entry point.
//!
//! ```text
//! tether-satellite                  Run in the foreground
//! tether-satellite --config <path>  Load a custom config TOML
//! tether-satellite --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tether_satellite::config::SatelliteConfig;
use tether_satellite::service::SatelliteService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tether-satellite", about = "Tether satellite service")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "tether-satellite.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        println!("{}", toml::to_string_pretty(&SatelliteConfig::default())?);
        return Ok(());
    }

    let config = SatelliteConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("tether-satellite v{}", env!("CARGO_PKG_VERSION"));
    info!("listening on {}", config.network.bind_addr);
    info!("artifacts land in {}", config.link.artifact_dir.display());

    let service = SatelliteService::new(config)?;
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await;
    Ok(())
}
