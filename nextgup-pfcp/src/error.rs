//! PFCP error types

use thiserror::Error;

use crate::message::Message;
use crate::session::SessionState;

/// Errors raised by the codec, the transaction engine and the session manager.
#[derive(Debug, Error)]
pub enum PfcpError {
    /// Buffer ended before a fixed-size field
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },
    /// Header flags other than version 1 with an optional SEID flag
    #[error("invalid header flags: {0:#04x}")]
    InvalidFlags(u8),
    /// Message type outside the supported set
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),
    /// Declared message length disagrees with the datagram size
    #[error("length mismatch: header declares {declared} bytes, {actual} follow")]
    LengthMismatch {
        /// Length field value
        declared: usize,
        /// Bytes actually present
        actual: usize,
    },
    /// A TLV claims more bytes than remain
    #[error("truncated IE {ie_type}: length {length}, {remaining} bytes remain")]
    TruncatedIe {
        /// IE type
        ie_type: u16,
        /// Declared length
        length: usize,
        /// Bytes remaining in the enclosing buffer
        remaining: usize,
    },
    /// A fixed-layout IE value has the wrong size
    #[error("invalid length {length} for IE {ie_type}")]
    InvalidIeLength {
        /// IE type
        ie_type: u16,
        /// Actual value length
        length: usize,
    },
    /// A mandatory child IE is absent
    #[error("missing mandatory IE {0}")]
    MissingIe(u16),
    /// An IE value cannot be represented
    #[error("invalid value for IE {ie_type}: {reason}")]
    InvalidIeValue {
        /// IE type
        ie_type: u16,
        /// What was wrong
        reason: String,
    },
    /// Encoded value does not fit a 16-bit length field
    #[error("IE {0} exceeds the maximum encodable length")]
    IeTooLong(u16),
    /// Encoded message does not fit the 16-bit length field
    #[error("message of {0} bytes exceeds the maximum encodable length")]
    MessageTooLong(usize),
    /// No correlated response within the wait window
    #[error("request timeout")]
    Timeout,
    /// Response type is not the request type + 1
    #[error("invalid message (type={actual}) from peer, expected type {expected}")]
    UnexpectedResponse {
        /// Expected response type code
        expected: u8,
        /// Received type code
        actual: u8,
        /// The message as received
        message: Box<Message>,
    },
    /// Peer answered with a non-success cause
    #[error("PFCP error (cause={cause}) from peer")]
    PeerRejected {
        /// Cause code
        cause: u8,
    },
    /// No session with this local SEID
    #[error("unknown session {0:016x}")]
    UnknownSession(u64),
    /// Context identifier is not 1 to 16 hexadecimal digits
    #[error("invalid context id: {0}")]
    InvalidContextId(String),
    /// Operation not allowed in the session's current state
    #[error("session {seid:016x} is {state}")]
    InvalidSessionState {
        /// Local SEID
        seid: u64,
        /// Current state
        state: SessionState,
    },
    /// The association's receive task has stopped
    #[error("association closed")]
    AssociationClosed,
    /// Socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for PFCP operations
pub type Result<T> = std::result::Result<T, PfcpError>;
