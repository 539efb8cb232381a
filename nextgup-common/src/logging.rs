//! Logging setup and protocol message tracing
//!
//! Thin layer over `tracing`/`tracing-subscriber`. Binaries call
//! [`init_logging`] once; the protocol engines call [`log_pfcp_message`] and
//! [`log_gtp_message`] for every datagram they send or accept.

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log verbosity selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything, including hex dumps of every datagram
    Trace,
    /// Per-message summaries
    Debug,
    /// Lifecycle events
    #[default]
    Info,
    /// Dropped datagrams and rejected requests
    Warn,
    /// Fatal task termination only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when it is set. Calling this twice is a no-op
/// for the second call.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}

/// Protocol direction for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the peer
    Rx,
    /// Sent to the peer
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("RX"),
            Direction::Tx => f.write_str("TX"),
        }
    }
}

/// Log a protocol message at debug level, with a hex dump at trace level.
pub fn log_protocol_message(protocol: &str, direction: Direction, msg_type: &str, data: &[u8]) {
    tracing::debug!(
        protocol = protocol,
        direction = %direction,
        msg_type = msg_type,
        len = data.len(),
        "{} {} message",
        direction,
        protocol
    );
    tracing::trace!(protocol = protocol, hex = %HexDump(data), "{} payload", protocol);
}

/// Log a PFCP message
pub fn log_pfcp_message(direction: Direction, msg_type: &str, data: &[u8]) {
    log_protocol_message("PFCP", direction, msg_type, data);
}

/// Log a GTP-U message
pub fn log_gtp_message(direction: Direction, msg_type: &str, data: &[u8]) {
    log_protocol_message("GTP-U", direction, msg_type, data);
}

/// Lower-case hex rendering of a byte slice, for log fields.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_display_round_trips() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Rx.to_string(), "RX");
        assert_eq!(Direction::Tx.to_string(), "TX");
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(HexDump(&[0x20, 0x01, 0x00, 0x0c]).to_string(), "2001000c");
        assert_eq!(HexDump(&[]).to_string(), "");
    }
}
