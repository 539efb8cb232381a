//! PFCP message framing
//!
//! ```text
//! 0        1        2        3
//! +--------+--------+--------+--------+
//! | flags  |  type  |     length      |
//! +--------+--------+--------+--------+
//! |        SEID (only if S flag)      |
//! |                                   |
//! +--------+--------+--------+--------+
//! |     sequence (24 bits)   |prio|   |
//! +--------+--------+--------+--------+
//! |             IEs ...               |
//! ```
//!
//! The length counts every byte after the first four.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{PfcpError, Result};
use crate::ie::{parse_ies, types, Cause, IeDecode, IeEncode, RawIe};

/// Well-known PFCP UDP port
pub const PFCP_PORT: u16 = 8805;

/// Version 1 with no other flags
pub const PFCP_VERSION_FLAGS: u8 = 0x20;

/// SEID present flag
pub const FLAG_S: u8 = 0x01;

/// Largest sequence number (24 bits)
pub const MAX_SEQUENCE: u32 = 0x00ff_ffff;

const FIXED_HEADER_SIZE: usize = 4;

/// PFCP message types handled by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Heartbeat Request
    HeartbeatRequest = 1,
    /// Heartbeat Response
    HeartbeatResponse = 2,
    /// PFD Management Request
    PfdManagementRequest = 3,
    /// PFD Management Response
    PfdManagementResponse = 4,
    /// Association Setup Request
    AssociationSetupRequest = 5,
    /// Association Setup Response
    AssociationSetupResponse = 6,
    /// Association Update Request
    AssociationUpdateRequest = 7,
    /// Association Update Response
    AssociationUpdateResponse = 8,
    /// Association Release Request
    AssociationReleaseRequest = 9,
    /// Association Release Response
    AssociationReleaseResponse = 10,
    /// Version Not Supported Response
    VersionNotSupportedResponse = 11,
    /// Node Report Request
    NodeReportRequest = 12,
    /// Node Report Response
    NodeReportResponse = 13,
    /// Session Establishment Request
    SessionEstablishmentRequest = 50,
    /// Session Establishment Response
    SessionEstablishmentResponse = 51,
    /// Session Modification Request
    SessionModificationRequest = 52,
    /// Session Modification Response
    SessionModificationResponse = 53,
    /// Session Deletion Request
    SessionDeletionRequest = 54,
    /// Session Deletion Response
    SessionDeletionResponse = 55,
    /// Session Report Request
    SessionReportRequest = 56,
    /// Session Report Response
    SessionReportResponse = 57,
}

impl MessageType {
    /// Convert from u8 to MessageType
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::HeartbeatRequest,
            2 => Self::HeartbeatResponse,
            3 => Self::PfdManagementRequest,
            4 => Self::PfdManagementResponse,
            5 => Self::AssociationSetupRequest,
            6 => Self::AssociationSetupResponse,
            7 => Self::AssociationUpdateRequest,
            8 => Self::AssociationUpdateResponse,
            9 => Self::AssociationReleaseRequest,
            10 => Self::AssociationReleaseResponse,
            11 => Self::VersionNotSupportedResponse,
            12 => Self::NodeReportRequest,
            13 => Self::NodeReportResponse,
            50 => Self::SessionEstablishmentRequest,
            51 => Self::SessionEstablishmentResponse,
            52 => Self::SessionModificationRequest,
            53 => Self::SessionModificationResponse,
            54 => Self::SessionDeletionRequest,
            55 => Self::SessionDeletionResponse,
            56 => Self::SessionReportRequest,
            57 => Self::SessionReportResponse,
            _ => return None,
        })
    }

    /// Types the control-plane side accepts from its peer: responses to its
    /// own requests plus heartbeat, node report and session report requests.
    pub fn is_accepted_inbound(self) -> bool {
        matches!(
            self,
            Self::HeartbeatRequest
                | Self::HeartbeatResponse
                | Self::PfdManagementResponse
                | Self::AssociationSetupResponse
                | Self::AssociationUpdateResponse
                | Self::AssociationReleaseResponse
                | Self::VersionNotSupportedResponse
                | Self::NodeReportRequest
                | Self::SessionEstablishmentResponse
                | Self::SessionModificationResponse
                | Self::SessionDeletionResponse
                | Self::SessionReportRequest
        )
    }

    /// Type code a peer answers this request with
    pub fn response_code(self) -> u8 {
        self as u8 + 1
    }

    /// Whether messages of this type carry a SEID
    pub fn is_session_message(self) -> bool {
        self as u8 >= 50
    }

    /// Name used in log output
    pub fn name(self) -> &'static str {
        match self {
            Self::HeartbeatRequest => "Heartbeat Request",
            Self::HeartbeatResponse => "Heartbeat Response",
            Self::PfdManagementRequest => "PFD Management Request",
            Self::PfdManagementResponse => "PFD Management Response",
            Self::AssociationSetupRequest => "Association Setup Request",
            Self::AssociationSetupResponse => "Association Setup Response",
            Self::AssociationUpdateRequest => "Association Update Request",
            Self::AssociationUpdateResponse => "Association Update Response",
            Self::AssociationReleaseRequest => "Association Release Request",
            Self::AssociationReleaseResponse => "Association Release Response",
            Self::VersionNotSupportedResponse => "Version Not Supported Response",
            Self::NodeReportRequest => "Node Report Request",
            Self::NodeReportResponse => "Node Report Response",
            Self::SessionEstablishmentRequest => "Session Establishment Request",
            Self::SessionEstablishmentResponse => "Session Establishment Response",
            Self::SessionModificationRequest => "Session Modification Request",
            Self::SessionModificationResponse => "Session Modification Response",
            Self::SessionDeletionRequest => "Session Deletion Request",
            Self::SessionDeletionResponse => "Session Deletion Response",
            Self::SessionReportRequest => "Session Report Request",
            Self::SessionReportResponse => "Session Report Response",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded PFCP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type
    pub message_type: MessageType,
    /// Session endpoint identifier, present on session messages
    pub seid: Option<u64>,
    /// 24-bit sequence number
    pub sequence: u32,
    /// 4-bit message priority
    pub priority: u8,
    /// Top-level IEs in wire order
    pub ies: Vec<RawIe>,
}

impl Message {
    /// Node-level message without IEs
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            seid: None,
            sequence: 0,
            priority: 0,
            ies: Vec::new(),
        }
    }

    /// Session-level message addressed to `seid`
    pub fn with_seid(message_type: MessageType, seid: u64) -> Self {
        Self {
            seid: Some(seid),
            ..Self::new(message_type)
        }
    }

    /// Response to `request`, echoing its sequence number
    pub fn response_to(request: &Message, message_type: MessageType) -> Self {
        Self {
            sequence: request.sequence,
            ..Self::new(message_type)
        }
    }

    /// Appends an IE
    pub fn push<T: IeEncode + ?Sized>(&mut self, ie: &T) -> Result<()> {
        self.ies.push(ie.to_raw_ie()?);
        Ok(())
    }

    /// First IE of `ie_type`
    pub fn find(&self, ie_type: u16) -> Option<&RawIe> {
        self.ies.iter().find(|ie| ie.ie_type == ie_type)
    }

    /// Every IE of `ie_type`, in order
    pub fn find_all(&self, ie_type: u16) -> impl Iterator<Item = &RawIe> {
        self.ies.iter().filter(move |ie| ie.ie_type == ie_type)
    }

    /// Decodes the first IE of `ie_type`, if present
    pub fn decode_first<T: IeDecode>(&self, ie_type: u16) -> Result<Option<T>> {
        self.find(ie_type).map(|ie| ie.decode::<T>()).transpose()
    }

    /// Cause code, if the message carries one
    pub fn cause(&self) -> Result<Option<u8>> {
        self.find(types::CAUSE).map(RawIe::as_u8).transpose()
    }

    /// Fails with `PeerRejected` unless the cause is Request accepted.
    ///
    /// A missing Cause IE is treated as a rejection with cause 0.
    pub fn ensure_accepted(&self) -> Result<()> {
        match self.cause()? {
            Some(cause) if cause == Cause::RequestAccepted.code() => Ok(()),
            Some(cause) => Err(PfcpError::PeerRejected { cause }),
            None => Err(PfcpError::PeerRejected { cause: 0 }),
        }
    }

    /// Encodes the message
    pub fn encode(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(64);
        let flags = match self.seid {
            Some(_) => PFCP_VERSION_FLAGS | FLAG_S,
            None => PFCP_VERSION_FLAGS,
        };
        buf.put_u8(flags);
        buf.put_u8(self.message_type as u8);
        buf.put_u16(0);
        if let Some(seid) = self.seid {
            buf.put_u64(seid);
        }
        buf.put_u32(((self.sequence & MAX_SEQUENCE) << 8) | (u32::from(self.priority & 0x0f) << 4));
        for ie in &self.ies {
            ie.encode_ie(&mut buf)?;
        }

        let length = buf.len() - FIXED_HEADER_SIZE;
        let length = u16::try_from(length).map_err(|_| PfcpError::MessageTooLong(buf.len()))?;
        buf[2..4].copy_from_slice(&length.to_be_bytes());
        Ok(buf)
    }

    /// Decodes a datagram.
    ///
    /// The flags byte must be exactly version 1 with an optional S flag and
    /// the declared length must match the datagram size.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(PfcpError::BufferTooShort {
                needed: FIXED_HEADER_SIZE,
                available: data.len(),
            });
        }

        let flags = data[0];
        if flags != PFCP_VERSION_FLAGS && flags != PFCP_VERSION_FLAGS | FLAG_S {
            return Err(PfcpError::InvalidFlags(flags));
        }
        let message_type =
            MessageType::from_u8(data[1]).ok_or(PfcpError::InvalidMessageType(data[1]))?;
        let declared = u16::from_be_bytes([data[2], data[3]]) as usize;
        let body = &data[FIXED_HEADER_SIZE..];
        if declared != body.len() {
            return Err(PfcpError::LengthMismatch {
                declared,
                actual: body.len(),
            });
        }

        let seid_len = if flags & FLAG_S != 0 { 8 } else { 0 };
        if body.len() < seid_len + 4 {
            return Err(PfcpError::BufferTooShort {
                needed: FIXED_HEADER_SIZE + seid_len + 4,
                available: data.len(),
            });
        }
        let seid = (seid_len == 8).then(|| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&body[..8]);
            u64::from_be_bytes(bytes)
        });
        let word = u32::from_be_bytes([
            body[seid_len],
            body[seid_len + 1],
            body[seid_len + 2],
            body[seid_len + 3],
        ]);

        Ok(Self {
            message_type,
            seid,
            sequence: word >> 8,
            priority: ((word >> 4) & 0x0f) as u8,
            ies: parse_ies(&body[seid_len + 4..])?,
        })
    }
}
