//! SmartPort bridge: entry point.
//!
//! Connects to a SmartPort-over-SLIP server and runs a host bus loop against
//! it.  No disk emulation is attached in this binary, so every command the
//! server forwards is answered with SmartPort's "no device connected" status.
//! The loop is useful for checking that a server is reachable, that framing
//! works in both directions, and that remote reboot is honoured.
//!
//! # Usage
//!
//! ```text
//! smartport-bridge [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   Config file [default: platform config dir]
//!   --host      <HOST>   Server host name or IP
//!   --port      <PORT>   Server TCP port
//!   --log-level <LEVEL>  error | warn | info | debug | trace
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Overrides      |
//! |----------------------|----------------|
//! | `SP_BRIDGE_CONFIG`   | `--config`     |
//! | `SP_BRIDGE_HOST`     | `--host`       |
//! | `SP_BRIDGE_PORT`     | `--port`       |
//! | `SP_BRIDGE_LOG`      | `--log-level`  |
//!
//! CLI values win over the config file.  `RUST_LOG`, when set, wins over any
//! configured log level.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use smartport_core::domain::Phase;
use smartport_core::protocol::messages::PacketType;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use smartport_bridge::infrastructure::network::{resolve_server_addr, TcpSlipConnector};
use smartport_bridge::infrastructure::storage::config::{
    load_config, load_config_from, AppConfig,
};
use smartport_bridge::{Bridge, BridgeSettings};

/// SmartPort status byte for "no device connected".
const STATUS_NO_DRIVE: u8 = 0x28;

/// Largest payload the host loop accepts from a request.
const PAYLOAD_BUFFER_LEN: usize = 1024;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// SmartPort-over-SLIP network bridge.
#[derive(Debug, Parser)]
#[command(
    name = "smartport-bridge",
    about = "Bridges a SmartPort bus to a remote SLIP-over-TCP server",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "SP_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Host name or IP address of the server.
    #[arg(long, env = "SP_BRIDGE_HOST")]
    host: Option<String>,

    /// TCP port of the server.
    #[arg(long, env = "SP_BRIDGE_PORT")]
    port: Option<u16>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "SP_BRIDGE_LOG")]
    log_level: Option<String>,
}

impl Cli {
    /// Loads the config file and applies CLI overrides on top of it.
    fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => load_config().context("failed to load config")?,
        };

        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.log_level = level.clone();
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// `main` stays synchronous: the bus loop is a plain polling loop, and the
/// bridge owns the async runtime that drives the network side.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    info!(
        "SmartPort bridge starting, server {}:{}",
        config.server.host, config.server.port
    );

    let server_addr = resolve_server_addr(&config.server.host, config.server.port)
        .context("server address resolution failed")?;
    let connector = Arc::new(TcpSlipConnector::new(config.connection.max_frame_len));
    let settings = BridgeSettings {
        server_addr,
        retry: config.connection.retry_policy(),
    };

    let mut bridge = Bridge::connect(connector, settings).context("failed to start bridge")?;

    // ── Ctrl+C handler ────────────────────────────────────────────────────────
    // Also cuts short a reconnect that is blocking the bus loop.
    let shutdown = bridge.shutdown_handle();
    let shutdown_signal = shutdown.clone();
    bridge.runtime_handle().spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                shutdown_signal.request();
            }
            Err(e) => error!("failed to listen for Ctrl+C: {e}"),
        }
    });

    // ── Bus loop ──────────────────────────────────────────────────────────────
    let poll_interval = config.bus.poll_interval();
    while !shutdown.is_requested() {
        match bridge.poll_phase() {
            Phase::Enabled => answer_without_device(&mut bridge),
            Phase::Reset => info!("bus reset requested by server"),
            Phase::Idle => std::thread::sleep(poll_interval),
        }
    }

    bridge.disconnect();
    info!("SmartPort bridge stopped");
    Ok(())
}

/// Answers the staged request as a bus with no disk attached.
fn answer_without_device(bridge: &mut Bridge) {
    let Some(request) = bridge.current_request() else {
        return;
    };
    let (command, unit) = (request.command(), request.unit());

    let mut payload = [0u8; PAYLOAD_BUFFER_LEN];
    let payload_len = bridge.decode_into(&mut payload);
    info!(
        command = command.name(),
        unit,
        payload_len,
        "no device attached; answering with NODRIVE"
    );

    if let Err(e) = bridge.encode_response(unit, PacketType::Status, STATUS_NO_DRIVE, &[]) {
        warn!("could not encode response: {e}");
        return;
    }
    // The bridge logs the failure and abandons the transaction itself.
    if let Err(e) = bridge.send_response_packet() {
        debug!(command = command.name(), unit, "response not delivered: {e}");
    }
}
