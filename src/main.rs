//! sampler-sync - headless control client for the sampler plugin
//!
//! Connects to the plugin, keeps its state synchronized and logs what
//! changes. With `--repl`, commands can be typed at a prompt.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use sampler_sync::{cli, AppConfig, Endpoint, SyncHandle, SyncSettings, TransportMode, UiEvent};

/// Sampler Sync - keep the sampler plugin state in sync and control it
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sampler-sync.yaml")]
    config: String,

    /// Plugin host (overrides config)
    #[arg(long, env = "SAMPLER_HOST")]
    host: Option<String>,

    /// Plugin WebSocket port (overrides config)
    #[arg(short, long, env = "SAMPLER_PORT")]
    port: Option<u16>,

    /// Transport: plain (ws), secure (wss) or auto (overrides config)
    #[arg(short, long, value_enum)]
    transport: Option<TransportMode>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Start an interactive prompt
    #[arg(long)]
    repl: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let loaded = AppConfig::read(&args.config).await?;
    let config_found = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    if let Some(host) = &args.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(transport) = args.transport {
        config.connection.transport = transport;
    }
    config.validate()?;

    let _log_guard = init_logging(&args.log_level, args.log_json, config.logging.file.as_deref())?;

    info!("Starting sampler-sync v{}...", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Configuration file: {}", args.config);
    } else {
        info!("No config file at {}, using defaults", args.config);
    }

    let handle = SyncHandle::connect(
        Endpoint::from(&config.connection),
        Duration::from_millis(config.sync.reconnect_delay_ms),
        SyncSettings::from(&config.sync),
    );
    let events = tokio::spawn(log_events(handle.events()));

    if args.repl {
        // Ctrl-C is handled by the prompt itself
        cli::run_repl(handle.clone()).await?;
    } else {
        shutdown_signal().await;
    }

    handle.shutdown();
    let _ = events.await;

    info!("sampler-sync shutdown complete");
    Ok(())
}

/// Log every UI notification; ends when the synchronizer stops
async fn log_events(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::ConnectionChanged(status) => info!("Connection {}", status),
            UiEvent::FullStateReplaced => info!("📥 Full state replaced"),
            UiEvent::QueryResults { count } => info!("🔎 Query returned {} sounds", count),
            UiEvent::VolatileStateReplaced => {},
            other => debug!(?other, "UI event"),
        }
    }
}

fn init_logging(level: &str, json: bool, file: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().json().with_target(false).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    let (file_layer, guard) = match file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
