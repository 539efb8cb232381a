//! gNB node configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use nextgup_common::config::{require_nonzero, require_specified, YamlConfig};
use nextgup_common::{Error, Result};
use nextgup_gtp::{GtpConfig, GTP_U_PORT, MAX_QFI};
use serde::{Deserialize, Serialize};

/// Top-level gNB configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnbConfig {
    /// Local GTP-U address
    #[serde(default = "default_local_addr")]
    pub local_addr: SocketAddr,
    /// Echo Request period, in seconds
    #[serde(default = "default_echo_interval")]
    pub echo_interval: u64,
    /// Tunnels bound at start-up
    #[serde(default)]
    pub tunnels: Vec<TunnelConfig>,
}

/// One tunnel to bind at start-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Peer GTP-U address
    pub remote: SocketAddr,
    /// TUN device name
    pub device: String,
    /// QoS flow id stamped on uplink frames
    #[serde(default)]
    pub flow_id: Option<u8>,
}

fn default_local_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), GTP_U_PORT)
}

fn default_echo_interval() -> u64 {
    60
}

impl Default for GnbConfig {
    fn default() -> Self {
        Self {
            local_addr: default_local_addr(),
            echo_interval: default_echo_interval(),
            tunnels: Vec::new(),
        }
    }
}

impl GnbConfig {
    /// Tunnel engine parameters derived from this configuration
    pub fn gtp_config(&self) -> GtpConfig {
        GtpConfig::new(self.local_addr).with_echo_interval(Duration::from_secs(self.echo_interval))
    }
}

impl YamlConfig for GnbConfig {
    fn validate(&self) -> Result<()> {
        require_nonzero("echo_interval", self.echo_interval)?;
        for tunnel in &self.tunnels {
            require_specified("tunnels.remote", &tunnel.remote)?;
            if tunnel.device.is_empty() {
                return Err(Error::Config("tunnels.device must not be empty".into()));
            }
            if let Some(flow) = tunnel.flow_id {
                if flow > MAX_QFI {
                    return Err(Error::Config(format!(
                        "tunnels.flow_id {flow} exceeds {MAX_QFI}"
                    )));
                }
            }
        }
        Ok(())
    }
}
