//! Tunnel endpoint and UE address IEs
//!
//! Both IEs start with a flag byte announcing which optional fields follow.

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{put_ie, types, IeDecode, IeEncode, ValueReader};
use crate::error::{PfcpError, Result};

/// F-TEID (type 21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FTeid {
    /// A concrete tunnel endpoint
    #[serde(rename_all = "camelCase")]
    Assigned {
        /// Tunnel endpoint identifier
        teid: u32,
        /// IPv4 endpoint address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv4: Option<Ipv4Addr>,
        /// IPv6 endpoint address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv6: Option<Ipv6Addr>,
    },
    /// Ask the peer to allocate the endpoint (CH flag)
    #[serde(rename_all = "camelCase")]
    Choose {
        /// Allocate an IPv4 address
        #[serde(default)]
        ipv4: bool,
        /// Allocate an IPv6 address
        #[serde(default)]
        ipv6: bool,
        /// Reuse one allocation across PDRs sharing this id (CHID flag)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        choose_id: Option<u8>,
    },
}

impl FTeid {
    const V4: u8 = 0x01;
    const V6: u8 = 0x02;
    const CH: u8 = 0x04;
    const CHID: u8 = 0x08;

    /// Allocated TEID, if this is a concrete endpoint
    pub fn teid(&self) -> Option<u32> {
        match self {
            Self::Assigned { teid, .. } => Some(*teid),
            Self::Choose { .. } => None,
        }
    }
}

impl IeEncode for FTeid {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut value = BytesMut::with_capacity(25);
        match *self {
            Self::Assigned { teid, ipv4, ipv6 } => {
                let mut flags = 0;
                if ipv4.is_some() {
                    flags |= Self::V4;
                }
                if ipv6.is_some() {
                    flags |= Self::V6;
                }
                value.put_u8(flags);
                value.put_u32(teid);
                if let Some(v4) = ipv4 {
                    value.put_slice(&v4.octets());
                }
                if let Some(v6) = ipv6 {
                    value.put_slice(&v6.octets());
                }
            }
            Self::Choose {
                ipv4,
                ipv6,
                choose_id,
            } => {
                let mut flags = Self::CH;
                if ipv4 {
                    flags |= Self::V4;
                }
                if ipv6 {
                    flags |= Self::V6;
                }
                if choose_id.is_some() {
                    flags |= Self::CHID;
                }
                value.put_u8(flags);
                if let Some(id) = choose_id {
                    value.put_u8(id);
                }
            }
        }
        put_ie(buf, types::F_TEID, &value)
    }
}

impl IeDecode for FTeid {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::F_TEID, value);
        let flags = reader.u8()?;

        if flags & Self::CH != 0 {
            let choose_id = if flags & Self::CHID != 0 {
                Some(reader.u8()?)
            } else {
                None
            };
            return Ok(Self::Choose {
                ipv4: flags & Self::V4 != 0,
                ipv6: flags & Self::V6 != 0,
                choose_id,
            });
        }
        if flags & Self::CHID != 0 {
            return Err(PfcpError::InvalidIeValue {
                ie_type: types::F_TEID,
                reason: "CHID set without CH".into(),
            });
        }

        let teid = reader.u32()?;
        let ipv4 = if flags & Self::V4 != 0 {
            Some(Ipv4Addr::from(reader.take::<4>()?))
        } else {
            None
        };
        let ipv6 = if flags & Self::V6 != 0 {
            Some(Ipv6Addr::from(reader.take::<16>()?))
        } else {
            None
        };
        Ok(Self::Assigned { teid, ipv4, ipv6 })
    }
}

/// UE IP Address (type 93)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UeIpAddress {
    /// Address is a destination address (S/D flag)
    pub destination: bool,
    /// IPv4 address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address or prefix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,
    /// Ask the peer to allocate an IPv4 address (CHV4)
    pub choose_ipv4: bool,
    /// Ask the peer to allocate an IPv6 address (CHV6)
    pub choose_ipv6: bool,
    /// IPv6 prefix delegation bits (IPv6D)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix_delegation_bits: Option<u8>,
    /// IPv6 prefix length (IP6PL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6_prefix_length: Option<u8>,
}

impl UeIpAddress {
    const V6: u8 = 0x01;
    const V4: u8 = 0x02;
    const SD: u8 = 0x04;
    const IPV6D: u8 = 0x08;
    const CHV4: u8 = 0x10;
    const CHV6: u8 = 0x20;
    const IP6PL: u8 = 0x40;

    fn flags(&self) -> u8 {
        [
            (self.ipv6.is_some(), Self::V6),
            (self.ipv4.is_some(), Self::V4),
            (self.destination, Self::SD),
            (self.ipv6_prefix_delegation_bits.is_some(), Self::IPV6D),
            (self.choose_ipv4, Self::CHV4),
            (self.choose_ipv6, Self::CHV6),
            (self.ipv6_prefix_length.is_some(), Self::IP6PL),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |flags, (_, bit)| flags | bit)
    }
}

impl IeEncode for UeIpAddress {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut value = BytesMut::with_capacity(23);
        value.put_u8(self.flags());
        if let Some(v4) = self.ipv4 {
            value.put_slice(&v4.octets());
        }
        if let Some(v6) = self.ipv6 {
            value.put_slice(&v6.octets());
        }
        if let Some(bits) = self.ipv6_prefix_delegation_bits {
            value.put_u8(bits);
        }
        if let Some(len) = self.ipv6_prefix_length {
            value.put_u8(len);
        }
        put_ie(buf, types::UE_IP_ADDRESS, &value)
    }
}

impl IeDecode for UeIpAddress {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::UE_IP_ADDRESS, value);
        let flags = reader.u8()?;
        let mut ue_ip = Self {
            destination: flags & Self::SD != 0,
            choose_ipv4: flags & Self::CHV4 != 0,
            choose_ipv6: flags & Self::CHV6 != 0,
            ..Self::default()
        };
        if flags & Self::V4 != 0 {
            ue_ip.ipv4 = Some(Ipv4Addr::from(reader.take::<4>()?));
        }
        if flags & Self::V6 != 0 {
            ue_ip.ipv6 = Some(Ipv6Addr::from(reader.take::<16>()?));
        }
        if flags & Self::IPV6D != 0 {
            ue_ip.ipv6_prefix_delegation_bits = Some(reader.u8()?);
        }
        if flags & Self::IP6PL != 0 {
            ue_ip.ipv6_prefix_length = Some(reader.u8()?);
        }
        Ok(ue_ip)
    }
}
