//! SMF node configuration
//!
//! ```yaml
//! local_addr: 127.0.0.1:8805
//! remote_addr: 127.0.0.2:8805
//! response_timeout_ms: 3000
//! heartbeat_interval: 60
//! sessions:
//!   - name: internet
//!     create:
//!       pdrs: [...]
//!       fars: [...]
//!     options:
//!       dnn: internet
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use nextgup_common::config::{require_nonzero, require_specified, YamlConfig};
use nextgup_common::Result;
use nextgup_pfcp::{CreateRules, EstablishmentOptions, PfcpConfig, PFCP_PORT};
use serde::{Deserialize, Serialize};

/// Top-level SMF configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmfConfig {
    /// Local PFCP address
    #[serde(default = "default_local_addr")]
    pub local_addr: SocketAddr,
    /// UPF PFCP address
    pub remote_addr: SocketAddr,
    /// Response wait, in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Heartbeat period, in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Sessions established at start-up
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

/// One session to establish at start-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Label used in log output
    pub name: String,
    /// Rules sent in the Session Establishment Request
    #[serde(default)]
    pub create: CreateRules,
    /// Optional session-level IEs
    #[serde(default)]
    pub options: EstablishmentOptions,
}

fn default_local_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), PFCP_PORT)
}

fn default_response_timeout_ms() -> u64 {
    3000
}

fn default_heartbeat_interval() -> u64 {
    60
}

impl SmfConfig {
    /// Configuration towards `remote_addr` with default timers and no sessions
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            local_addr: default_local_addr(),
            remote_addr,
            response_timeout_ms: default_response_timeout_ms(),
            heartbeat_interval: default_heartbeat_interval(),
            sessions: Vec::new(),
        }
    }

    /// Association parameters derived from this configuration
    pub fn pfcp_config(&self) -> PfcpConfig {
        PfcpConfig::new(self.local_addr, self.remote_addr)
            .with_response_timeout(Duration::from_millis(self.response_timeout_ms))
            .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval))
    }
}

impl YamlConfig for SmfConfig {
    fn validate(&self) -> Result<()> {
        require_specified("remote_addr", &self.remote_addr)?;
        require_nonzero("response_timeout_ms", self.response_timeout_ms)?;
        require_nonzero("heartbeat_interval", self.heartbeat_interval)
    }
}
