//! PFCP (Packet Forwarding Control Protocol) control-plane library
//!
//! Implements the control-plane side of 3GPP TS 29.244: an information
//! element codec, the message framer, a transaction engine correlating
//! requests and responses over one UDP association, and a session lifecycle
//! manager on top of it.
//!
//! # Example
//!
//! ```
//! use nextgup_pfcp::message::{Message, MessageType};
//! use nextgup_pfcp::ie::{types, RecoveryTimeStamp};
//!
//! let mut request = Message::new(MessageType::HeartbeatRequest);
//! request.sequence = 42;
//! request.push(&RecoveryTimeStamp(3_900_000_000)).unwrap();
//!
//! let encoded = request.encode().unwrap();
//! let decoded = Message::decode(&encoded).unwrap();
//! assert_eq!(decoded.sequence, 42);
//! assert!(decoded.find(types::RECOVERY_TIME_STAMP).is_some());
//! ```

pub mod association;
pub mod error;
pub mod ie;
pub mod message;
pub mod session;
mod transaction;

pub use association::{Association, PfcpConfig, DEFAULT_HEARTBEAT_INTERVAL};
pub use error::{PfcpError, Result};
pub use message::{Message, MessageType, PFCP_PORT};
pub use session::{
    format_context_id, parse_context_id, CreateRules, EstablishmentOptions, EstablishmentResult,
    ModificationOptions, ModificationResult, RemoveRules, SessionInfo, SessionManager,
    SessionReport, SessionState, UpdateRules,
};
pub use transaction::DEFAULT_RESPONSE_TIMEOUT;
