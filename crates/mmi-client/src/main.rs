//! `mmi-client`: a command-line input watcher.
//!
//! Connects to the MMI service, registers a monitor for the chosen event
//! classes, and logs every event the service reports until Ctrl-C.  Useful
//! for checking a device setup without writing an application.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mmi_client::application::handler_manager::InputEventConsumer;
use mmi_client::infrastructure::config::ClientConfig;
use mmi_client::ClientContext;
use mmi_core::domain::{DeviceTags, EventTypeMask};
use mmi_core::{KeyEvent, PointerEvent};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventClass {
    Key,
    Pointer,
    Touch,
    All,
}

impl EventClass {
    fn mask(self) -> EventTypeMask {
        EventTypeMask(match self {
            Self::Key => EventTypeMask::KEY,
            Self::Pointer => EventTypeMask::POINTER,
            Self::Touch => EventTypeMask::TOUCH,
            Self::All => EventTypeMask::ALL,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "mmi-client", version, about = "Watch input events reported by the MMI service")]
struct Cli {
    /// Service socket.
    #[arg(long, env = "MMI_SOCKET", default_value = "/run/mmi/mmi.sock")]
    socket: PathBuf,

    /// Program name reported to the service.
    #[arg(long, default_value = "mmi-client")]
    program: String,

    /// Event classes to monitor.
    #[arg(long, value_enum, default_value = "all")]
    events: EventClass,
}

struct LoggingMonitor;

impl InputEventConsumer for LoggingMonitor {
    fn on_key_event(&self, event: &KeyEvent) {
        info!(
            id = event.id,
            code = event.key_code,
            action = ?event.key_action,
            "key"
        );
    }

    fn on_pointer_event(&self, event: &PointerEvent) {
        info!(
            id = event.id,
            source = ?event.source_type,
            action = ?event.pointer_action,
            pointer = event.pointer_id,
            "pointer"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig {
        socket_path: cli.socket,
        program_name: cli.program,
        ..ClientConfig::default()
    };
    let ctx = ClientContext::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.socket_path.display()))?;

    let monitor = ctx
        .manager
        .handlers()
        .add_monitor(cli.events.mask(), DeviceTags(DeviceTags::ALL), Arc::new(LoggingMonitor))
        .await
        .context("registering monitor")?;
    info!(?monitor, events = ?cli.events, "watching input.  Press Ctrl-C to exit.");

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for shutdown signal")?;
            ctx.manager
                .handlers()
                .remove_monitor(monitor)
                .await
                .context("removing monitor")?;
        }
        _ = ctx.router => info!("service closed the connection"),
    }
    Ok(())
}
