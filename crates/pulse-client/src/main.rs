//! Headless Pulse client entry point.
//!
//! `pulse-client listen` joins a survey page the way a browser tab would:
//! it keeps a WebSocket open to the page's host (reconnecting forever),
//! logs results, participant counts and reactions as they arrive, and reads
//! gestures from stdin (`emoji`, `emoji 🎉`, `tap <id>`, `touch <id>`,
//! `next <secret>`).
//!
//! `pulse-client next-slide` performs the presenter action once and exits.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pulse_client::headless::{LoggedCount, LoggedResults, LoggedStage};
use pulse_client::presenter::REJECTED_ALERT;
use pulse_client::{
    ClientContext, ConnectionManager, DEFAULT_CONFIG_PATH, Gesture, LoggingHost, PageLocation,
    PresenterClient, forward_gestures,
};
use pulse_core::{ClientConfig, CountBinding, ResultsBinding};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Pulse audience-response client.
#[derive(Debug, Parser)]
#[command(name = "pulse-client", version, about)]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, env = "PULSE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Join the configured page and follow live updates (default).
    Listen,
    /// Ask the server to advance to the next slide.
    NextSlide {
        /// Presenter secret; falls back to `presenter.secret`.
        #[arg(long)]
        secret: Option<String>,
    },
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the presenter action
/// is refused.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    let config = ClientConfig::load(&cli.config)?;
    let page = PageLocation::parse(&config.page.url)?;
    info!(
        page = %config.page.url,
        websocket = %page.websocket_url(),
        reconnect_delay_ms = config.connection.reconnect_delay_ms,
        emojis = config.reactions.enabled,
        "configuration loaded"
    );

    match cli.command.unwrap_or(Command::Listen) {
        Command::Listen => listen(&config, &page).await,
        Command::NextSlide { secret } => {
            let secret = secret
                .or_else(|| config.presenter.secret.clone())
                .ok_or("no presenter secret given (use --secret or PULSE_PRESENTER_SECRET)")?;
            let presenter = PresenterClient::new(page.next_slide_url());
            if presenter.advance_slide(&secret).await {
                Ok(())
            } else {
                Err(REJECTED_ALERT.into())
            }
        }
    }
}

/// Run the client loop until the connection task stops or Ctrl-C.
async fn listen(
    config: &ClientConfig,
    page: &PageLocation,
) -> Result<(), Box<dyn std::error::Error>> {
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();
    let (gesture_tx, gesture_rx) = mpsc::channel(16);

    let connection = ConnectionManager::new(page.websocket_url(), &config.connection).spawn(conn_tx);

    let mut ctx = ClientContext::new(
        page,
        &config.reactions,
        LoggedStage::new(f64::from(config.reactions.viewport_width)),
        LoggingHost::new(page.path()),
        connection,
        timer_tx,
    );
    ctx.subscribe(ResultsBinding::new(Some(LoggedResults::default())));
    ctx.subscribe(CountBinding::new(Some(LoggedCount)));
    ctx.start();

    spawn_gesture_reader(gesture_tx)?;

    info!("client running, press Ctrl-C to stop");
    tokio::select! {
        _ = ctx.run(conn_rx, timer_rx, gesture_rx) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("shutting down");
        }
    }

    Ok(())
}

/// Read gestures from stdin on a plain OS thread, outside the runtime,
/// so a pending read never holds up shutdown.
fn spawn_gesture_reader(gestures: mpsc::Sender<Gesture>) -> std::io::Result<()> {
    let _reader = std::thread::Builder::new()
        .name(String::from("gesture-reader"))
        .spawn(move || forward_gestures(std::io::stdin().lock(), &gestures))?;
    Ok(())
}
