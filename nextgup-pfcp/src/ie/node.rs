//! Node-level and session-level identity IEs

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{put_ie, read_array, types, IeDecode, IeEncode, ValueReader};
use crate::error::{PfcpError, Result};

/// Node ID (type 60)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeId {
    /// IPv4 address
    Ipv4(Ipv4Addr),
    /// IPv6 address
    Ipv6(Ipv6Addr),
    /// Fully qualified domain name
    Fqdn(String),
}

impl From<IpAddr> for NodeId {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::Ipv4(v4),
            IpAddr::V6(v6) => Self::Ipv6(v6),
        }
    }
}

impl IeEncode for NodeId {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut value = BytesMut::new();
        match self {
            Self::Ipv4(v4) => {
                value.put_u8(0);
                value.put_slice(&v4.octets());
            }
            Self::Ipv6(v6) => {
                value.put_u8(1);
                value.put_slice(&v6.octets());
            }
            Self::Fqdn(name) => {
                value.put_u8(2);
                for label in name.split('.').filter(|l| !l.is_empty()) {
                    let len = u8::try_from(label.len())
                        .ok()
                        .filter(|len| *len < 64)
                        .ok_or_else(|| PfcpError::InvalidIeValue {
                            ie_type: types::NODE_ID,
                            reason: format!("label too long: {label}"),
                        })?;
                    value.put_u8(len);
                    value.put_slice(label.as_bytes());
                }
            }
        }
        put_ie(buf, types::NODE_ID, &value)
    }
}

impl IeDecode for NodeId {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::NODE_ID, value);
        match reader.u8()? & 0x0f {
            0 => Ok(Self::Ipv4(Ipv4Addr::from(reader.take::<4>()?))),
            1 => Ok(Self::Ipv6(Ipv6Addr::from(reader.take::<16>()?))),
            2 => {
                let mut rest = reader.remaining();
                let mut labels = Vec::new();
                while let Some((&len, tail)) = rest.split_first() {
                    let label = tail.get(..len as usize).ok_or(PfcpError::InvalidIeLength {
                        ie_type: types::NODE_ID,
                        length: value.len(),
                    })?;
                    labels.push(String::from_utf8_lossy(label).into_owned());
                    rest = &tail[len as usize..];
                }
                Ok(Self::Fqdn(labels.join(".")))
            }
            other => Err(PfcpError::InvalidIeValue {
                ie_type: types::NODE_ID,
                reason: format!("unknown node id type {other}"),
            }),
        }
    }
}

/// F-SEID (type 57): a session endpoint identifier and its node address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FSeid {
    /// Session endpoint identifier
    pub seid: u64,
    /// IPv4 address of the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address of the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,
}

impl FSeid {
    const V6: u8 = 0x01;
    const V4: u8 = 0x02;

    /// F-SEID for `seid` at `ip`
    pub fn new(seid: u64, ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self {
                seid,
                ipv4: Some(v4),
                ipv6: None,
            },
            IpAddr::V6(v6) => Self {
                seid,
                ipv4: None,
                ipv6: Some(v6),
            },
        }
    }
}

impl IeEncode for FSeid {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut flags = 0;
        if self.ipv4.is_some() {
            flags |= Self::V4;
        }
        if self.ipv6.is_some() {
            flags |= Self::V6;
        }
        let mut value = BytesMut::with_capacity(29);
        value.put_u8(flags);
        value.put_u64(self.seid);
        if let Some(v4) = self.ipv4 {
            value.put_slice(&v4.octets());
        }
        if let Some(v6) = self.ipv6 {
            value.put_slice(&v6.octets());
        }
        put_ie(buf, types::F_SEID, &value)
    }
}

impl IeDecode for FSeid {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::F_SEID, value);
        let flags = reader.u8()?;
        let seid = reader.u64()?;
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
        Ok(Self { seid, ipv4, ipv6 })
    }
}

/// Seconds between the NTP era 0 epoch (1900-01-01) and the Unix epoch
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// Recovery Time Stamp (type 96): node start time in NTP seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecoveryTimeStamp(pub u32);

impl RecoveryTimeStamp {
    /// Time stamp for the current instant
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Time stamp for `time`, truncated to whole seconds
    pub fn from_system_time(time: SystemTime) -> Self {
        let unix = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self((unix + NTP_UNIX_OFFSET) as u32)
    }

    /// Converts back to wall-clock time (NTP era 0)
    pub fn to_system_time(self) -> SystemTime {
        let unix = u64::from(self.0).saturating_sub(NTP_UNIX_OFFSET);
        UNIX_EPOCH + Duration::from_secs(unix)
    }
}

impl IeEncode for RecoveryTimeStamp {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_ie(buf, types::RECOVERY_TIME_STAMP, &self.0.to_be_bytes())
    }
}

impl IeDecode for RecoveryTimeStamp {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        Ok(Self(u32::from_be_bytes(read_array(
            types::RECOVERY_TIME_STAMP,
            value,
        )?)))
    }
}

/// S-NSSAI (type 257)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/service type
    pub sst: u8,
    /// Slice differentiator (24 bits)
    pub sd: u32,
}

impl IeEncode for SNssai {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let sd = self.sd.to_be_bytes();
        put_ie(buf, types::S_NSSAI, &[self.sst, sd[1], sd[2], sd[3]])
    }
}

impl IeDecode for SNssai {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let [sst, a, b, c] = read_array(types::S_NSSAI, value)?;
        Ok(Self {
            sst,
            sd: u32::from_be_bytes([0, a, b, c]),
        })
    }
}
