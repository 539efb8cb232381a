//! GTP-U header encoding/decoding
//!
//! Implements the subset of the GTP-U (3GPP TS 29.281) header used by the
//! tunnel engine: the 8-byte base header, the optional sequence block and the
//! PDU Session Container extension header carrying a QoS flow identifier.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// GTP-U protocol version (always 1)
pub const GTP_VERSION: u8 = 1;

/// GTP-U protocol type (1 for GTP-U, 0 for GTP')
pub const GTP_PROTOCOL_TYPE: u8 = 1;

/// Extension header flag
pub const FLAG_E: u8 = 0x04;
/// Sequence number flag
pub const FLAG_S: u8 = 0x02;
/// N-PDU number flag
pub const FLAG_PN: u8 = 0x01;

/// Recovery IE type carried in Echo Response
pub const IE_RECOVERY: u8 = 14;

/// Largest valid QoS flow identifier (6 bits)
pub const MAX_QFI: u8 = 0x3f;

/// PDU type of an uplink PDU Session Container (UL PDU SESSION INFORMATION)
const PDU_TYPE_UL_SESSION_INFO: u8 = 1;

/// GTP-U Message Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GtpMessageType {
    /// Echo Request
    EchoRequest = 1,
    /// Echo Response
    EchoResponse = 2,
    /// Error Indication
    ErrorIndication = 26,
    /// Supported Extension Headers Notification
    SupportedExtHeadersNotification = 31,
    /// End Marker
    EndMarker = 254,
    /// T-PDU (user data)
    TPdu = 255,
}

impl GtpMessageType {
    /// Convert from u8 to GtpMessageType
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::EchoRequest),
            2 => Some(Self::EchoResponse),
            26 => Some(Self::ErrorIndication),
            31 => Some(Self::SupportedExtHeadersNotification),
            254 => Some(Self::EndMarker),
            255 => Some(Self::TPdu),
            _ => None,
        }
    }

    /// Name used in log output
    pub fn name(self) -> &'static str {
        match self {
            Self::EchoRequest => "Echo Request",
            Self::EchoResponse => "Echo Response",
            Self::ErrorIndication => "Error Indication",
            Self::SupportedExtHeadersNotification => "Supported Extension Headers Notification",
            Self::EndMarker => "End Marker",
            Self::TPdu => "T-PDU",
        }
    }
}

/// Extension Header Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExtHeaderType {
    /// No more extension headers
    NoMore = 0x00,
    /// PDU Session Container extension header
    PduSessionContainer = 0x85,
}

/// GTP-U codec errors
#[derive(Debug, Error)]
pub enum GtpError {
    /// Buffer too short for header
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },
    /// Invalid GTP version
    #[error("invalid GTP version: {0}, expected 1")]
    InvalidVersion(u8),
    /// Invalid protocol type
    #[error("invalid protocol type: {0}, expected 1 for GTP-U")]
    InvalidProtocolType(u8),
    /// A header flag this implementation does not handle (N-PDU number)
    #[error("unsupported header flags: {0:#04x}")]
    UnsupportedFlags(u8),
    /// Invalid message type
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),
    /// Invalid extension header length
    #[error("invalid extension header length: {0}")]
    InvalidExtHeaderLength(u8),
    /// Length field would exceed 16 bits
    #[error("message too long: length field {0} exceeds 65535")]
    MessageTooLong(usize),
}

/// GTP-U Header
///
/// The GTP-U header is at least 8 bytes:
/// - Flags (1 byte): version, PT, E, S, PN
/// - Message Type (1 byte)
/// - Length (2 bytes)
/// - TEID (4 bytes)
///
/// Optional fields (4 bytes if flag E or S is set):
/// - Sequence Number (2 bytes)
/// - N-PDU Number (1 byte)
/// - Next Extension Header Type (1 byte)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpHeader {
    /// Message type
    pub message_type: GtpMessageType,
    /// Tunnel Endpoint Identifier
    pub teid: u32,
    /// Sequence number (optional)
    pub sequence_number: Option<u16>,
    /// QoS flow identifier from a PDU Session Container (optional)
    pub qfi: Option<u8>,
    /// Payload data
    pub payload: Bytes,
}

impl GtpHeader {
    /// Minimum GTP-U header size (without optional fields)
    pub const MIN_HEADER_SIZE: usize = 8;

    /// Size of the PDU Session Container as written on uplink
    const PDU_SESSION_CONTAINER_SIZE: usize = 4;

    /// Create a new GTP-U header with minimal fields
    pub fn new(message_type: GtpMessageType, teid: u32, payload: Bytes) -> Self {
        Self {
            message_type,
            teid,
            sequence_number: None,
            qfi: None,
            payload,
        }
    }

    /// Create a T-PDU message (user data)
    pub fn t_pdu(teid: u32, payload: Bytes) -> Self {
        Self::new(GtpMessageType::TPdu, teid, payload)
    }

    /// Create an Echo Request message. Echo messages always use TEID 0.
    pub fn echo_request(sequence: u16) -> Self {
        Self::new(GtpMessageType::EchoRequest, 0, Bytes::new()).with_sequence_number(sequence)
    }

    /// Create an Echo Response carrying a zero Recovery IE
    pub fn echo_response(sequence: u16) -> Self {
        Self::new(
            GtpMessageType::EchoResponse,
            0,
            Bytes::from_static(&[IE_RECOVERY, 0x00]),
        )
        .with_sequence_number(sequence)
    }

    /// Set sequence number
    pub fn with_sequence_number(mut self, seq: u16) -> Self {
        self.sequence_number = Some(seq);
        self
    }

    /// Attach a PDU Session Container carrying `qfi`
    pub fn with_qfi(mut self, qfi: u8) -> Self {
        self.qfi = Some(qfi & MAX_QFI);
        self
    }

    fn has_optional_fields(&self) -> bool {
        self.sequence_number.is_some() || self.qfi.is_some()
    }

    /// Length field value: everything after the TEID
    fn calculate_length(&self) -> usize {
        let mut length = 0;
        if self.has_optional_fields() {
            length += 4;
        }
        if self.qfi.is_some() {
            length += Self::PDU_SESSION_CONTAINER_SIZE;
        }
        length + self.payload.len()
    }

    /// Calculate the encoded size of this header including payload
    pub fn encoded_size(&self) -> usize {
        Self::MIN_HEADER_SIZE + self.calculate_length()
    }

    /// Encode the GTP-U header to bytes
    pub fn encode(&self) -> Result<BytesMut, GtpError> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Encode the GTP-U header to an existing buffer
    ///
    /// Nothing is written if the length field does not fit in 16 bits.
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<(), GtpError> {
        let length = self.calculate_length();
        let length = u16::try_from(length).map_err(|_| GtpError::MessageTooLong(length))?;
        let flags: u8 = (GTP_VERSION << 5)
            | (GTP_PROTOCOL_TYPE << 4)
            | (if self.qfi.is_some() { FLAG_E } else { 0 })
            | (if self.sequence_number.is_some() { FLAG_S } else { 0 });

        buf.put_u8(flags);
        buf.put_u8(self.message_type as u8);
        buf.put_u16(length);
        buf.put_u32(self.teid);

        if self.has_optional_fields() {
            buf.put_u16(self.sequence_number.unwrap_or(0));
            buf.put_u8(0);
            match self.qfi {
                Some(qfi) => {
                    buf.put_u8(ExtHeaderType::PduSessionContainer as u8);
                    // one 4-byte unit: length, PDU type, QFI, next type
                    buf.put_u8(1);
                    buf.put_u8(PDU_TYPE_UL_SESSION_INFO << 4);
                    buf.put_u8(qfi & MAX_QFI);
                    buf.put_u8(ExtHeaderType::NoMore as u8);
                }
                None => buf.put_u8(ExtHeaderType::NoMore as u8),
            }
        }

        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a GTP-U header from bytes
    ///
    /// Extension headers other than the PDU Session Container are skipped
    /// using their declared length. Bytes beyond the declared length are
    /// ignored.
    pub fn decode(data: &[u8]) -> Result<Self, GtpError> {
        if data.len() < Self::MIN_HEADER_SIZE {
            return Err(GtpError::BufferTooShort {
                needed: Self::MIN_HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut buf = data;

        let flags = buf.get_u8();
        let version = (flags >> 5) & 0x07;
        let protocol_type = (flags >> 4) & 0x01;
        let has_ext = (flags & FLAG_E) != 0;
        let has_seq = (flags & FLAG_S) != 0;

        if version != GTP_VERSION {
            return Err(GtpError::InvalidVersion(version));
        }
        if protocol_type != GTP_PROTOCOL_TYPE {
            return Err(GtpError::InvalidProtocolType(protocol_type));
        }
        if flags & FLAG_PN != 0 {
            return Err(GtpError::UnsupportedFlags(flags));
        }

        let msg_type_raw = buf.get_u8();
        let message_type = GtpMessageType::from_u8(msg_type_raw)
            .ok_or(GtpError::InvalidMessageType(msg_type_raw))?;

        let length = buf.get_u16() as usize;
        let teid = buf.get_u32();

        let total_needed = Self::MIN_HEADER_SIZE + length;
        if data.len() < total_needed {
            return Err(GtpError::BufferTooShort {
                needed: total_needed,
                available: data.len(),
            });
        }
        let mut body = &buf[..length];

        let mut sequence_number = None;
        let mut qfi = None;

        if has_ext || has_seq {
            if body.remaining() < 4 {
                return Err(GtpError::BufferTooShort {
                    needed: Self::MIN_HEADER_SIZE + 4,
                    available: Self::MIN_HEADER_SIZE + body.remaining(),
                });
            }
            let seq = body.get_u16();
            let _n_pdu = body.get_u8();
            let mut next_ext_type = body.get_u8();
            if has_seq {
                sequence_number = Some(seq);
            }

            while has_ext && next_ext_type != ExtHeaderType::NoMore as u8 {
                let Some(&len_units) = body.first() else {
                    return Err(GtpError::BufferTooShort {
                        needed: 1,
                        available: 0,
                    });
                };
                if len_units == 0 {
                    return Err(GtpError::InvalidExtHeaderLength(0));
                }
                let total_len = len_units as usize * 4;
                if body.len() < total_len {
                    return Err(GtpError::BufferTooShort {
                        needed: total_len,
                        available: body.len(),
                    });
                }
                if next_ext_type == ExtHeaderType::PduSessionContainer as u8 {
                    qfi = Some(body[2] & MAX_QFI);
                }
                next_ext_type = body[total_len - 1];
                body.advance(total_len);
            }
        }

        Ok(Self {
            message_type,
            teid,
            sequence_number,
            qfi,
            payload: Bytes::copy_from_slice(body),
        })
    }
}
