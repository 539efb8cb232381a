//! PFCP information elements
//!
//! Every IE is a TLV: 16-bit type, 16-bit length, value. Grouped IEs carry a
//! nested TLV sequence as their value. Encoding writes a placeholder header,
//! encodes the children in place, then backpatches the length, so a length
//! field always matches the bytes actually written.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use nextgup_pfcp::ie::{parse_ies, IeDecode, IeEncode, RemovePdr};
//!
//! let mut buf = BytesMut::new();
//! RemovePdr { pdr_id: 7 }.encode_ie(&mut buf).unwrap();
//! assert_eq!(&buf[..], &[0x00, 0x0f, 0x00, 0x06, 0x00, 0x38, 0x00, 0x02, 0x00, 0x07]);
//!
//! let ies = parse_ies(&buf).unwrap();
//! assert_eq!(RemovePdr::decode_ie(&ies[0].value).unwrap(), RemovePdr { pdr_id: 7 });
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{PfcpError, Result};

mod bar;
mod enums;
mod far;
mod node;
mod pdr;
mod qer;
mod report;
mod tunnel;
mod urr;

pub use bar::{CreateBar, RemoveBar, UpdateBar};
pub use enums::{Cause, Interface, OuterHeaderRemovalDescription, PdnType, UnknownName};
pub use far::{
    ApplyAction, CreateFar, ForwardingParameters, OuterHeader, OuterHeaderCreation, RemoveFar,
    UpdateFar, UpdateForwardingParameters,
};
pub use node::{FSeid, NodeId, RecoveryTimeStamp, SNssai};
pub use pdr::{CreatePdr, CreatedPdr, OuterHeaderRemoval, Pdi, RemovePdr, UpdatePdr, UpdatedPdr};
pub use qer::{Bitrate, CreateQer, GateStatus, RemoveQer, UpdateQer};
pub use report::{DownlinkDataReport, ReportType};
pub use tunnel::{FTeid, UeIpAddress};
pub use urr::{CreateUrr, MeasurementMethod, RemoveUrr, UpdateUrr, VolumeThreshold};

/// IE type codes (3GPP TS 29.244 clause 8.1.2)
pub mod types {
    #![allow(missing_docs)]

    pub const CREATE_PDR: u16 = 1;
    pub const PDI: u16 = 2;
    pub const CREATE_FAR: u16 = 3;
    pub const FORWARDING_PARAMETERS: u16 = 4;
    pub const CREATE_URR: u16 = 6;
    pub const CREATE_QER: u16 = 7;
    pub const CREATED_PDR: u16 = 8;
    pub const UPDATE_PDR: u16 = 9;
    pub const UPDATE_FAR: u16 = 10;
    pub const UPDATE_FORWARDING_PARAMETERS: u16 = 11;
    pub const UPDATE_URR: u16 = 13;
    pub const UPDATE_QER: u16 = 14;
    pub const REMOVE_PDR: u16 = 15;
    pub const REMOVE_FAR: u16 = 16;
    pub const REMOVE_QER: u16 = 18;
    pub const CAUSE: u16 = 19;
    pub const SOURCE_INTERFACE: u16 = 20;
    pub const F_TEID: u16 = 21;
    pub const NETWORK_INSTANCE: u16 = 22;
    pub const GATE_STATUS: u16 = 25;
    pub const MBR: u16 = 26;
    pub const GBR: u16 = 27;
    pub const QER_CORRELATION_ID: u16 = 28;
    pub const PRECEDENCE: u16 = 29;
    pub const TRANSPORT_LEVEL_MARKING: u16 = 30;
    pub const VOLUME_THRESHOLD: u16 = 31;
    pub const REPORTING_TRIGGERS: u16 = 37;
    pub const REPORT_TYPE: u16 = 39;
    pub const DESTINATION_INTERFACE: u16 = 42;
    pub const APPLY_ACTION: u16 = 44;
    pub const DL_DATA_SERVICE_INFORMATION: u16 = 45;
    pub const PDR_ID: u16 = 56;
    pub const F_SEID: u16 = 57;
    pub const NODE_ID: u16 = 60;
    pub const MEASUREMENT_METHOD: u16 = 62;
    pub const REMOVE_URR: u16 = 77;
    pub const URR_ID: u16 = 81;
    pub const DOWNLINK_DATA_REPORT: u16 = 83;
    pub const OUTER_HEADER_CREATION: u16 = 84;
    pub const CREATE_BAR: u16 = 85;
    pub const UPDATE_BAR: u16 = 86;
    pub const REMOVE_BAR: u16 = 87;
    pub const BAR_ID: u16 = 88;
    pub const CP_FUNCTION_FEATURES: u16 = 89;
    pub const UE_IP_ADDRESS: u16 = 93;
    pub const OUTER_HEADER_REMOVAL: u16 = 95;
    pub const RECOVERY_TIME_STAMP: u16 = 96;
    pub const FAR_ID: u16 = 108;
    pub const QER_ID: u16 = 109;
    pub const PDN_TYPE: u16 = 113;
    pub const USER_PLANE_INACTIVITY_TIMER: u16 = 117;
    pub const RQI: u16 = 123;
    pub const QFI: u16 = 124;
    pub const SUGGESTED_BUFFERING_PACKETS_COUNT: u16 = 140;
    pub const PAGING_POLICY_INDICATOR: u16 = 158;
    pub const DNN: u16 = 159;
    pub const UPDATED_PDR: u16 = 256;
    pub const S_NSSAI: u16 = 257;
    pub const DATA_STATUS: u16 = 260;
}

/// Size of a TLV header
pub const IE_HEADER_SIZE: usize = 4;

/// Writes a complete TLV (header and value) into a buffer.
pub trait IeEncode {
    /// Appends this IE to `buf`.
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()>;

    /// Encodes this IE as a standalone [`RawIe`].
    fn to_raw_ie(&self) -> Result<RawIe> {
        let mut buf = BytesMut::new();
        self.encode_ie(&mut buf)?;
        if buf.len() < IE_HEADER_SIZE {
            return Err(PfcpError::BufferTooShort {
                needed: IE_HEADER_SIZE,
                available: buf.len(),
            });
        }
        let header = buf.split_to(IE_HEADER_SIZE);
        Ok(RawIe {
            ie_type: u16::from_be_bytes([header[0], header[1]]),
            value: buf.freeze(),
        })
    }
}

/// Builds a value from a TLV's value bytes.
pub trait IeDecode: Sized {
    /// Decodes from the value part of the TLV (header already stripped).
    fn decode_ie(value: &[u8]) -> Result<Self>;
}

/// An undecoded TLV as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIe {
    /// IE type code
    pub ie_type: u16,
    /// Value bytes
    pub value: Bytes,
}

impl RawIe {
    /// Creates a raw IE
    pub fn new(ie_type: u16, value: impl Into<Bytes>) -> Self {
        Self {
            ie_type,
            value: value.into(),
        }
    }

    /// Decodes the value as `T`
    pub fn decode<T: IeDecode>(&self) -> Result<T> {
        T::decode_ie(&self.value)
    }

    /// Parses the value as a nested TLV sequence
    pub fn children(&self) -> Result<Vec<RawIe>> {
        parse_ies(&self.value)
    }

    /// First byte of the value
    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.fixed::<1>()?[0])
    }

    /// Big-endian u16 value
    pub fn as_u16(&self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.fixed()?))
    }

    /// Big-endian u32 value
    pub fn as_u32(&self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.fixed()?))
    }

    /// UTF-8 string value
    pub fn as_string(&self) -> Result<String> {
        String::from_utf8(self.value.to_vec()).map_err(|e| PfcpError::InvalidIeValue {
            ie_type: self.ie_type,
            reason: e.to_string(),
        })
    }

    /// Leading `N` bytes of the value; longer values are accepted.
    fn fixed<const N: usize>(&self) -> Result<[u8; N]> {
        read_array(self.ie_type, &self.value)
    }
}

impl IeEncode for RawIe {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_ie(buf, self.ie_type, &self.value)
    }

    fn to_raw_ie(&self) -> Result<RawIe> {
        Ok(self.clone())
    }
}

/// Parses a flat TLV sequence until the buffer is exhausted.
///
/// A trailing TLV whose declared length runs past the end fails the whole
/// sequence.
pub fn parse_ies(mut data: &[u8]) -> Result<Vec<RawIe>> {
    let mut ies = Vec::new();
    while !data.is_empty() {
        if data.len() < IE_HEADER_SIZE {
            return Err(PfcpError::BufferTooShort {
                needed: IE_HEADER_SIZE,
                available: data.len(),
            });
        }
        let ie_type = u16::from_be_bytes([data[0], data[1]]);
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let rest = &data[IE_HEADER_SIZE..];
        if rest.len() < length {
            return Err(PfcpError::TruncatedIe {
                ie_type,
                length,
                remaining: rest.len(),
            });
        }
        ies.push(RawIe::new(ie_type, Bytes::copy_from_slice(&rest[..length])));
        data = &rest[length..];
    }
    Ok(ies)
}

/// Appends a leaf TLV.
pub fn put_ie(buf: &mut BytesMut, ie_type: u16, value: &[u8]) -> Result<()> {
    let length = u16::try_from(value.len()).map_err(|_| PfcpError::IeTooLong(ie_type))?;
    buf.reserve(IE_HEADER_SIZE + value.len());
    buf.put_u16(ie_type);
    buf.put_u16(length);
    buf.put_slice(value);
    Ok(())
}

/// Appends a grouped TLV whose value is written by `children`.
pub fn put_group<F>(buf: &mut BytesMut, ie_type: u16, children: F) -> Result<()>
where
    F: FnOnce(&mut BytesMut) -> Result<()>,
{
    let start = buf.len();
    buf.put_u16(ie_type);
    buf.put_u16(0);
    children(buf)?;
    backpatch_length(buf, start, ie_type)
}

/// Rewrites the 16-bit length at `start + 2` with the bytes written after
/// the TLV header.
pub(crate) fn backpatch_length(buf: &mut BytesMut, start: usize, ie_type: u16) -> Result<()> {
    let length = buf.len() - start - IE_HEADER_SIZE;
    let length = u16::try_from(length).map_err(|_| PfcpError::IeTooLong(ie_type))?;
    buf[start + 2..start + 4].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

pub(crate) fn put_u8_ie(buf: &mut BytesMut, ie_type: u16, value: u8) -> Result<()> {
    put_ie(buf, ie_type, &[value])
}

pub(crate) fn put_u16_ie(buf: &mut BytesMut, ie_type: u16, value: u16) -> Result<()> {
    put_ie(buf, ie_type, &value.to_be_bytes())
}

pub(crate) fn put_u32_ie(buf: &mut BytesMut, ie_type: u16, value: u32) -> Result<()> {
    put_ie(buf, ie_type, &value.to_be_bytes())
}

pub(crate) fn put_str_ie(buf: &mut BytesMut, ie_type: u16, value: &str) -> Result<()> {
    put_ie(buf, ie_type, value.as_bytes())
}

/// Encodes every element of `items`, in order.
pub(crate) fn put_all<T: IeEncode>(buf: &mut BytesMut, items: &[T]) -> Result<()> {
    items.iter().try_for_each(|item| item.encode_ie(buf))
}

pub(crate) fn read_array<const N: usize>(ie_type: u16, value: &[u8]) -> Result<[u8; N]> {
    value
        .get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(PfcpError::InvalidIeLength {
            ie_type,
            length: value.len(),
        })
}

/// Sequential reader over a fixed-layout IE value.
pub(crate) struct ValueReader<'a> {
    ie_type: u16,
    data: &'a [u8],
}

impl<'a> ValueReader<'a> {
    pub(crate) fn new(ie_type: u16, data: &'a [u8]) -> Self {
        Self { ie_type, data }
    }

    pub(crate) fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = read_array::<N>(self.ie_type, self.data)?;
        self.data = &self.data[N..];
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub(crate) fn remaining(&self) -> &'a [u8] {
        self.data
    }
}
