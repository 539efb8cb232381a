//! nextgup SMF: PFCP control-plane node
//!
//! Opens one PFCP association towards a UPF, establishes the sessions listed
//! in its configuration, logs every Session Report the UPF sends, and on
//! Ctrl+C deletes the sessions and releases the association.
//!
//! # Usage
//!
//! ```bash
//! nextgup-smf -c config/smf.yaml
//! nextgup-smf -l 127.0.0.1:8805 -r 127.0.0.2:8805 --heartbeat 10
//! ```

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nextgup_common::config::YamlConfig;
use nextgup_common::{init_logging, LogLevel};
use nextgup_pfcp::{format_context_id, Association, SessionManager};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::{SessionConfig, SmfConfig};

/// nextgup SMF - PFCP control-plane node
#[derive(Parser, Debug)]
#[command(name = "nextgup-smf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SMF configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Local PFCP address
    #[arg(short = 'l', long = "local", value_name = "ADDR")]
    local: Option<SocketAddr>,

    /// UPF PFCP address
    #[arg(short = 'r', long = "remote", value_name = "ADDR")]
    remote: Option<SocketAddr>,

    /// Heartbeat interval in seconds
    #[arg(long = "heartbeat", value_name = "SECS")]
    heartbeat: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long = "log-level", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

impl Args {
    /// Loads the file configuration, if any, and applies command-line overrides.
    fn resolve_config(&self) -> Result<SmfConfig> {
        let mut config = match (&self.config_file, self.remote) {
            (Some(path), _) => {
                info!("Loading configuration from: {}", path.display());
                SmfConfig::from_yaml_file(path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?
            }
            (None, Some(remote)) => SmfConfig::new(remote),
            (None, None) => anyhow::bail!("either --config or --remote is required"),
        };

        if let Some(local) = self.local {
            config.local_addr = local;
        }
        if let Some(remote) = self.remote {
            config.remote_addr = remote;
        }
        if let Some(heartbeat) = self.heartbeat {
            config.heartbeat_interval = heartbeat;
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Establishes one configured session and starts logging its reports.
async fn establish(sessions: &SessionManager, session: &SessionConfig) -> Result<()> {
    let result = sessions
        .establish(&session.create, &session.options)
        .await
        .with_context(|| format!("Failed to establish session {}", session.name))?;

    let context = format_context_id(result.session_id);
    info!(
        "Session {} established as {} (peer SEID {:#018x})",
        session.name, context, result.peer_seid
    );
    for created in &result.created_pdrs {
        info!(
            "  PDR {} local F-TEID {:?} UE IP {:?}",
            created.pdr_id, created.local_f_teid, created.ue_ip_address
        );
    }

    let sessions = sessions.clone();
    let id = result.session_id;
    tokio::spawn(async move {
        // ends once the session leaves the registry
        while let Ok(report) = sessions.next_report(id).await {
            info!("Session {} report: {:?}", context, report);
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run_smf(args).await {
        Ok(()) => {
            info!("SMF exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("SMF failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Main SMF execution logic
async fn run_smf(args: Args) -> Result<()> {
    let config = args.resolve_config()?;
    info!(
        "PFCP {} -> {}, heartbeat every {}s",
        config.local_addr, config.remote_addr, config.heartbeat_interval
    );

    let association = Association::open(config.pfcp_config())
        .await
        .with_context(|| format!("Failed to associate with {}", config.remote_addr))?;

    let sessions = association.sessions();
    for session in &config.sessions {
        if let Err(e) = establish(&sessions, session).await {
            warn!("{:#}", e);
        }
    }

    info!("SMF started, waiting for Ctrl+C...");
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating shutdown...");

    association.close().await;
    Ok(())
}
