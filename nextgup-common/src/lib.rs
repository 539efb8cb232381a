//! Common utilities for nextgup
//!
//! Shared error type, logging setup and YAML configuration helpers used by
//! the protocol crates and the node binaries.

pub mod config;
pub mod error;
pub mod logging;

pub use config::YamlConfig;
pub use error::{Error, Result};
pub use logging::{
    init_logging, log_gtp_message, log_pfcp_message, log_protocol_message, Direction, HexDump,
    LogLevel,
};
