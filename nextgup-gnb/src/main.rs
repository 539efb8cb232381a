//! nextgup gNB: GTP-U access node
//!
//! Starts the tunnel engine, binds the tunnels listed in its configuration
//! to their TUN devices and forwards user traffic until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! nextgup-gnb -c config/gnb.yaml
//! nextgup-gnb -l 127.0.0.1:2152 -r 127.0.0.2:2152 --device gtp0
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nextgup_common::config::YamlConfig;
use nextgup_common::{init_logging, LogLevel};
use nextgup_gtp::Handler;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{GnbConfig, TunnelConfig};

/// nextgup gNB - GTP-U tunnel node
#[derive(Parser, Debug)]
#[command(name = "nextgup-gnb")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the gNB configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Local GTP-U address
    #[arg(short = 'l', long = "local", value_name = "ADDR")]
    local: Option<SocketAddr>,

    /// Peer GTP-U address for an extra tunnel
    #[arg(short = 'r', long = "remote", value_name = "ADDR", requires = "device")]
    remote: Option<SocketAddr>,

    /// TUN device for the extra tunnel
    #[arg(long = "device", value_name = "NAME", requires = "remote")]
    device: Option<String>,

    /// Echo Request interval in seconds
    #[arg(long = "heartbeat", value_name = "SECS")]
    heartbeat: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long = "log-level", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

impl Args {
    /// Loads the file configuration, if any, and applies command-line overrides.
    fn resolve_config(&self) -> Result<GnbConfig> {
        let mut config = match &self.config_file {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                GnbConfig::from_yaml_file(path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?
            }
            None => GnbConfig::default(),
        };

        if let Some(local) = self.local {
            config.local_addr = local;
        }
        if let Some(heartbeat) = self.heartbeat {
            config.echo_interval = heartbeat;
        }
        if let (Some(remote), Some(device)) = (self.remote, &self.device) {
            config.tunnels.push(TunnelConfig {
                remote,
                device: device.clone(),
                flow_id: None,
            });
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Binds one configured tunnel and applies its flow id.
async fn bind(handler: &Handler, tunnel: &TunnelConfig) -> Result<()> {
    let teid = handler
        .bind(tunnel.remote, &tunnel.device)
        .await
        .with_context(|| format!("Failed to bind {} towards {}", tunnel.device, tunnel.remote))?;
    if let Some(flow) = tunnel.flow_id {
        handler.set_flow_id(teid, flow).await?;
    }
    info!(
        "Tunnel {} <-> {} bound as TEID {:#010x}",
        tunnel.device, tunnel.remote, teid
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run_gnb(args).await {
        Ok(()) => {
            info!("gNB exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("gNB failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main gNB execution logic
async fn run_gnb(args: Args) -> Result<()> {
    let config = args.resolve_config()?;

    let handler = Handler::start(config.gtp_config())
        .await
        .with_context(|| format!("Failed to start GTP-U on {}", config.local_addr))?;

    for tunnel in &config.tunnels {
        if let Err(e) = bind(&handler, tunnel).await {
            warn!("{:#}", e);
        }
    }

    info!(
        "gNB started with {} tunnel(s), waiting for Ctrl+C...",
        handler.tunnels().await.len()
    );
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating shutdown...");

    handler.close().await;
    Ok(())
}
