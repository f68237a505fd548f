//! `plcmon-tui`: Live terminal monitor for PLC device words.
//!
//! Shows a window of consecutive words (bit cells, formatted value, raw
//! hex) that stays current through backend push events or a polling
//! fallback, and lets the user write a value back to any row.
//!
//! Logs are written to a file (default `/tmp/plcmon-tui.log`) to avoid
//! corrupting the terminal UI.
//!
//! Entry point: CLI argument parsing, tracing setup, panic hooks, and app launch.

mod action;
mod app;
mod event;
mod theme;
mod tui;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use plcmon_config::{Config, FilePreferences};
use plcmon_core::{MemoryBackend, Monitor};

use crate::app::App;
use crate::view::ChannelView;

/// Terminal monitor for PLC device words.
#[derive(Parser, Debug)]
#[command(name = "plcmon-tui", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "PLCMON_CONFIG")]
    config: Option<PathBuf>,

    /// First address to monitor (e.g., D100)
    #[arg(short, long, env = "PLCMON_TARGET")]
    target: Option<String>,

    /// Mock server IP address
    #[arg(long, env = "PLCMON_IP")]
    ip: Option<String>,

    /// Mock server TCP port
    #[arg(long, env = "PLCMON_TCP_PORT")]
    tcp_port: Option<u16>,

    /// Mock server UDP port
    #[arg(long, env = "PLCMON_UDP_PORT")]
    udp_port: Option<u16>,

    /// Update interval in milliseconds
    #[arg(long, env = "PLCMON_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Poll for updates instead of subscribing to backend events
    #[arg(long)]
    polling: bool,

    /// Log file path (defaults to /tmp/plcmon-tui.log)
    #[arg(long, default_value = "/tmp/plcmon-tui.log")]
    log_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Layer command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(target) = &self.target {
            config.monitor.target.clone_from(target);
        }
        if let Some(ip) = &self.ip {
            config.server.ip.clone_from(ip);
        }
        if let Some(port) = self.tcp_port {
            config.server.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            config.server.udp_port = Some(port);
        }
        if let Some(ms) = self.interval_ms {
            config.monitor.interval = format!("{ms}ms");
        }
        if self.polling {
            config.monitor.events = false;
        }
    }
}

/// Set up file-based tracing. Never log to stdout/stderr, it would
/// corrupt the TUI output. Returns a guard that must be held for the
/// lifetime of the application to ensure logs are flushed.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("plcmon_tui={log_level},plcmon_core={log_level}"))
    });

    let log_dir = cli
        .log_file
        .parent()
        .unwrap_or(std::path::Path::new("/tmp"));
    let log_filename = cli
        .log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("plcmon-tui.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Hooks first: a panic during setup must still leave a usable shell
    tui::install_hooks()?;

    // Tracing to file; hold the guard so logs flush on exit
    let _log_guard = setup_tracing(&cli);

    let config_path = cli.config.clone().unwrap_or_else(plcmon_config::config_path);
    let mut config = plcmon_config::load_config_from(&config_path)?;
    cli.apply(&mut config);
    let monitor_config = config.monitor_config()?;
    let prefs = FilePreferences::load(&config_path)?;

    info!(
        path = %config_path.display(),
        token = %config.monitor.target,
        events = config.monitor.events,
        "starting plcmon-tui"
    );

    let backend = MemoryBackend::new();
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let monitor = Monitor::new(
        monitor_config,
        backend.clone(),
        Arc::new(ChannelView::new(action_tx.clone())),
        Arc::new(prefs),
    );

    let mut app = App::new(
        monitor,
        config.server.clone(),
        &config.monitor.target,
        action_tx,
        action_rx,
    );
    app.run(&backend).await?;

    Ok(())
}
