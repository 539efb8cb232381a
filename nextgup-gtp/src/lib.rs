//! GTP-U (GPRS Tunneling Protocol - User Plane) library
//!
//! Implements the GTP-U header codec and a tunnel engine that bridges UDP
//! encapsulated user traffic to virtual network devices, according to
//! 3GPP TS 29.281.
//!
//! # Example
//!
//! ```
//! use nextgup_gtp::codec::{GtpHeader, GtpMessageType};
//! use bytes::Bytes;
//!
//! // Uplink frame for TEID 0x12345678 tagged with QoS flow 9
//! let header = GtpHeader::t_pdu(0x12345678, Bytes::from_static(b"user data")).with_qfi(9);
//! let encoded = header.encode().unwrap();
//!
//! let decoded = GtpHeader::decode(&encoded).unwrap();
//! assert_eq!(decoded.message_type, GtpMessageType::TPdu);
//! assert_eq!(decoded.qfi, Some(9));
//! ```

pub mod codec;
pub mod device;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod tunnel;

pub use codec::{GtpError, GtpHeader, GtpMessageType, GTP_PROTOCOL_TYPE, GTP_VERSION, MAX_QFI};
pub use device::{Device, DeviceOpener, TunDevice, TunOpener};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryDevice, MemoryOpener, MemoryPort};
pub use tunnel::{GtpConfig, Handler, TunnelError, TunnelInfo, DEFAULT_ECHO_INTERVAL, GTP_U_PORT};
