//! MMI service entry point.
//!
//! Loads the configuration, builds the [`ServerContext`], starts the session
//! server and, when a recording is given, the input-reader thread.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ ServerContext::new()      -- registries, pipeline, transport
//!  └─ start services
//!       ├─ UdsServer::run        (Tokio task, one reader task per session)
//!       └─ input reader          (OS thread; replay source when --replay)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mmi_server::infrastructure::input_source::replay::ReplayInputSource;
use mmi_server::infrastructure::input_source::InputSource;
use mmi_server::infrastructure::storage::config::{default_config_path, load_config};
use mmi_server::infrastructure::transport::UdsServer;
use mmi_server::ServerContext;

#[derive(Debug, Parser)]
#[command(name = "mmi-server", version, about = "Multimodal input dispatch service")]
struct Cli {
    /// Configuration file.
    #[arg(long, env = "MMI_CONFIG")]
    config: Option<PathBuf>,

    /// Listening socket; overrides `server.socket_path`.
    #[arg(long, env = "MMI_SOCKET")]
    socket: Option<PathBuf>,

    /// JSON-lines recording of raw device samples to play.
    #[arg(long, env = "MMI_REPLAY")]
    replay: Option<PathBuf>,

    /// Reproduce the recorded timing instead of playing as fast as possible.
    #[arg(long, requires = "replay")]
    paced: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(socket) = cli.socket {
        config.server.socket_path = socket;
    }

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!(config = %config_path.display(), "MMI service starting");

    let ctx = ServerContext::new(config);

    // ── Session server ────────────────────────────────────────────────────────
    let socket_path = ctx.config.server.socket_path.clone();
    let listener = UdsServer::bind(&socket_path)
        .with_context(|| format!("binding {}", socket_path.display()))?;
    tokio::spawn(std::sync::Arc::clone(&ctx.transport).run(listener));
    info!(socket = %socket_path.display(), "listening for clients");

    // ── Input reader ──────────────────────────────────────────────────────────
    let source = cli
        .replay
        .map(|path| ReplayInputSource::new(path).with_pacing(cli.paced));
    match &source {
        Some(source) => {
            let rx = source.start().context("starting replay source")?;
            ctx.spawn_reader(rx).context("spawning input reader")?;
            info!(path = %source.path().display(), "replaying recorded input");
        }
        None => warn!("no input source configured; only injected events will be dispatched"),
    }

    info!("MMI service ready.  Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");

    if let Some(source) = &source {
        source.stop();
    }
    if let Err(e) = std::fs::remove_file(&socket_path) {
        warn!(error = %e, "could not remove socket file");
    }
    info!("MMI service stopped");
    Ok(())
}
