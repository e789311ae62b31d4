//! WebSocket load generator for a Pulse server.
//!
//! Opens many participant connections against the server's duplex
//! endpoint and reports how many stay up. Settings come from the
//! `loadtest` section of the config file, overridable on the command line.

use std::path::PathBuf;

use clap::Parser;
use pulse_client::loadtest::LoadTest;
use pulse_client::{DEFAULT_CONFIG_PATH, PageLocation};
use pulse_core::ClientConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pulse WebSocket load generator.
#[derive(Debug, Parser)]
#[command(name = "pulse-loadtest", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "PULSE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Page URL whose host is targeted (overrides `page.url`).
    #[arg(long)]
    url: Option<String>,

    /// Total connections to open.
    #[arg(long)]
    max: Option<u32>,

    /// Seconds over which connections are opened.
    #[arg(long)]
    ramp: Option<u64>,

    /// Total test duration in seconds.
    #[arg(long)]
    duration: Option<u64>,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load(&cli.config)?;
    if let Some(url) = cli.url {
        config.page.url = url;
    }
    if let Some(max) = cli.max {
        config.loadtest.max_connections = max;
    }
    if let Some(ramp) = cli.ramp {
        config.loadtest.ramp_up_secs = ramp;
    }
    if let Some(duration) = cli.duration {
        config.loadtest.duration_secs = duration;
    }

    let page = PageLocation::parse(&config.page.url)?;
    let test = LoadTest::new(page.websocket_url(), config.loadtest.clone());

    let summary = test
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    info!(
        max_connections = config.loadtest.max_connections,
        active_at_end = summary.active,
        max_concurrent = summary.max_concurrent,
        failed = summary.failed,
        "test completed"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
