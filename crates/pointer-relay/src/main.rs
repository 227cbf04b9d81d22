//! pointer-relay entry point.
//!
//! Reads pointer events as newline-delimited JSON on standard input and
//! forwards them to a broadcast overlay over a reconnecting WebSocket.
//!
//! # Usage
//!
//! ```text
//! capture-tool | pointer-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>               Config file [default: platform config dir]
//!   --endpoint-url <URL>          Overlay WebSocket URL
//!   --publish-interval-ms <MS>    Minimum spacing of mouse frames (8-100)
//!   --disabled                    Start with forwarding disabled
//!   --log-level <LEVEL>           error | warn | info | debug | trace
//! ```
//!
//! Each option can also be set through the matching `POINTER_RELAY_*`
//! environment variable.  Values given on the command line or in the
//! environment override the config file.
//!
//! On Unix, `SIGHUP` reloads the config file and reconciles the running
//! session with it.  Connection timings are read once at startup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pointer_relay::infrastructure::input_capture::line_source::LinePointerSource;
use pointer_relay::infrastructure::network::WsConnector;
use pointer_relay::infrastructure::storage::config::{
    config_file_path, load_config_from, RelayFile,
};
use pointer_relay::RelaySession;

/// How often connection statistics are logged.
const STATS_INTERVAL: Duration = Duration::from_secs(30);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Forwards live pointer events to a broadcast overlay.
#[derive(Debug, Parser)]
#[command(
    name = "pointer-relay",
    about = "Forwards pointer events from stdin to a WebSocket overlay",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "POINTER_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Overlay WebSocket URL, e.g. `ws://localhost:5173/mouse?source=obs`.
    #[arg(long, env = "POINTER_RELAY_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Minimum milliseconds between two `mouse` frames (8-100).
    #[arg(long, env = "POINTER_RELAY_PUBLISH_INTERVAL_MS")]
    publish_interval_ms: Option<u32>,

    /// Start with forwarding disabled.
    #[arg(long, env = "POINTER_RELAY_DISABLED")]
    disabled: bool,

    /// `tracing` level used when `RUST_LOG` is not set.
    #[arg(long, env = "POINTER_RELAY_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Resolves the config file location.
    ///
    /// # Errors
    ///
    /// Returns an error when no `--config` was given and the platform config
    /// directory cannot be determined.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("no --config given"),
        }
    }

    /// Loads the config file and layers command-line overrides on top.
    fn load(&self) -> anyhow::Result<RelayFile> {
        let path = self.config_path()?;
        let file = load_config_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        Ok(self.apply_overrides(file))
    }

    fn apply_overrides(&self, mut file: RelayFile) -> RelayFile {
        if let Some(url) = &self.endpoint_url {
            file.relay.endpoint_url = url.clone();
        }
        if let Some(ms) = self.publish_interval_ms {
            file.relay.publish_interval_ms = ms;
        }
        if self.disabled {
            file.relay.enabled = false;
        }
        if let Some(level) = &self.log_level {
            file.logging.log_level = level.clone();
        }
        file
    }
}

/// `RUST_LOG` wins; otherwise the configured level, falling back to `info`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

// ── Signals ───────────────────────────────────────────────────────────────────

#[cfg(unix)]
struct Hangup(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Hangup {
    fn new() -> anyhow::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(
            signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?,
        ))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> anyhow::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.load()?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&file.logging.log_level))
        .init();

    let config = file.to_config().context("invalid configuration")?;
    let policy = file.retry_policy().context("invalid connection timings")?;
    info!(
        "pointer-relay starting: endpoint={}, enabled={}, interval={}ms",
        config.endpoint_url,
        config.enabled,
        config.publish_interval.as_millis()
    );

    let session = Arc::new(RelaySession::new(
        config,
        policy,
        Arc::new(WsConnector),
        Box::new(LinePointerSource::stdin()),
        Handle::current(),
    ));

    // Lifecycle hooks join threads, so they run off the async workers.
    let loaded = Arc::clone(&session);
    tokio::task::spawn_blocking(move || loaded.on_load())
        .await
        .context("on_load panicked")?;

    let mut hangup = Hangup::new()?;
    let mut stats = tokio::time::interval_at(
        tokio::time::Instant::now() + STATS_INTERVAL,
        STATS_INTERVAL,
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("failed to listen for Ctrl+C signal: {e}");
                }
                info!("received Ctrl+C, shutting down");
                break;
            }
            () = hangup.recv() => reload(&cli, &session).await,
            _ = stats.tick() => {
                let s = session.stats();
                info!(
                    "overlay {}: attempts={} connects={} retries={} send_failures={} written={} dropped={}",
                    session.connection_state(),
                    s.attempts,
                    s.connects,
                    s.retries_scheduled,
                    s.send_failures,
                    s.frames_written,
                    s.frames_dropped
                );
            }
        }
    }

    let unloading = Arc::clone(&session);
    tokio::task::spawn_blocking(move || unloading.on_unload())
        .await
        .context("on_unload panicked")?;

    info!("pointer-relay stopped");
    Ok(())
}

/// Re-reads the config file and hands the result to the session.  On failure
/// the running config stays in place.
async fn reload(cli: &Cli, session: &Arc<RelaySession>) {
    info!("SIGHUP received, reloading config");
    let config = match cli.load().and_then(|file| Ok(file.to_config()?)) {
        Ok(config) => config,
        Err(e) => {
            warn!("config reload failed, keeping current settings: {e:#}");
            return;
        }
    };
    let session = Arc::clone(session);
    if let Err(e) = tokio::task::spawn_blocking(move || session.on_config_changed(config)).await {
        error!("config reload panicked: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
