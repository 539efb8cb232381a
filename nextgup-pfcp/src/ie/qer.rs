//! QoS Enforcement Rule IEs

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{
    parse_ies, put_group, put_ie, put_u32_ie, put_u8_ie, types, IeDecode, IeEncode, ValueReader,
};
use crate::error::{PfcpError, Result};

/// Gate Status (type 25)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    /// Uplink gate open
    #[serde(rename = "ul")]
    pub ul_open: bool,
    /// Downlink gate open
    #[serde(rename = "dl")]
    pub dl_open: bool,
}

impl GateStatus {
    const UL_CLOSED: u8 = 0x04;
    const DL_CLOSED: u8 = 0x01;

    /// Both gates open
    pub const OPEN: Self = Self {
        ul_open: true,
        dl_open: true,
    };
}

impl Default for GateStatus {
    fn default() -> Self {
        Self::OPEN
    }
}

impl IeEncode for GateStatus {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut value = 0;
        if !self.ul_open {
            value |= Self::UL_CLOSED;
        }
        if !self.dl_open {
            value |= Self::DL_CLOSED;
        }
        put_u8_ie(buf, types::GATE_STATUS, value)
    }
}

impl IeDecode for GateStatus {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let value = ValueReader::new(types::GATE_STATUS, value).u8()?;
        // each direction is a 2-bit field; any non-zero value means closed
        Ok(Self {
            ul_open: value & 0x0c == 0,
            dl_open: value & 0x03 == 0,
        })
    }
}

/// Uplink and downlink bit rates in kbps, as carried by MBR (26) and GBR (27)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitrate {
    /// Uplink rate
    pub ul: u64,
    /// Downlink rate
    pub dl: u64,
}

impl Bitrate {
    /// Largest rate a 5-byte field carries
    pub const MAX: u64 = (1 << 40) - 1;

    fn encode_as(&self, buf: &mut BytesMut, ie_type: u16) -> Result<()> {
        let mut value = BytesMut::with_capacity(10);
        for rate in [self.ul, self.dl] {
            if rate > Self::MAX {
                return Err(PfcpError::InvalidIeValue {
                    ie_type,
                    reason: format!("bit rate {rate} exceeds 40 bits"),
                });
            }
            value.put_slice(&rate.to_be_bytes()[3..]);
        }
        put_ie(buf, ie_type, &value)
    }

    fn decode_as(ie_type: u16, value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(ie_type, value);
        let mut read = || -> Result<u64> {
            let bytes = reader.take::<5>()?;
            Ok(bytes.iter().fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
        };
        let ul = read()?;
        let dl = read()?;
        Ok(Self { ul, dl })
    }
}

/// Create QER (type 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQer {
    /// Rule identifier
    pub qer_id: u32,
    /// Gate state
    #[serde(default)]
    pub gate_status: GateStatus,
    /// QER correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qer_correlation_id: Option<u32>,
    /// Maximum bit rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbr: Option<Bitrate>,
    /// Guaranteed bit rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gbr: Option<Bitrate>,
    /// QoS flow identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qfi: Option<u8>,
    /// Reflective QoS
    #[serde(default)]
    pub rqi: bool,
    /// Paging policy indicator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppi: Option<u8>,
}

impl CreateQer {
    /// Open QER with no rate limits
    pub fn new(qer_id: u32) -> Self {
        Self {
            qer_id,
            gate_status: GateStatus::OPEN,
            qer_correlation_id: None,
            mbr: None,
            gbr: None,
            qfi: None,
            rqi: false,
            ppi: None,
        }
    }
}

fn put_qos_tail(buf: &mut BytesMut, qfi: Option<u8>, rqi: bool, ppi: Option<u8>) -> Result<()> {
    if let Some(qfi) = qfi {
        put_u8_ie(buf, types::QFI, qfi)?;
    }
    if rqi {
        put_u8_ie(buf, types::RQI, 0x01)?;
    }
    if let Some(ppi) = ppi {
        put_u8_ie(buf, types::PAGING_POLICY_INDICATOR, ppi)?;
    }
    Ok(())
}

impl IeEncode for CreateQer {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::CREATE_QER, |buf| {
            put_u32_ie(buf, types::QER_ID, self.qer_id)?;
            self.gate_status.encode_ie(buf)?;
            if let Some(id) = self.qer_correlation_id {
                put_u32_ie(buf, types::QER_CORRELATION_ID, id)?;
            }
            if let Some(mbr) = &self.mbr {
                mbr.encode_as(buf, types::MBR)?;
            }
            if let Some(gbr) = &self.gbr {
                gbr.encode_as(buf, types::GBR)?;
            }
            put_qos_tail(buf, self.qfi, self.rqi, self.ppi)
        })
    }
}

/// Fields shared by Create QER and Update QER
#[derive(Default)]
struct QerFields {
    qer_id: Option<u32>,
    gate_status: Option<GateStatus>,
    qer_correlation_id: Option<u32>,
    mbr: Option<Bitrate>,
    gbr: Option<Bitrate>,
    qfi: Option<u8>,
    rqi: bool,
    ppi: Option<u8>,
}

impl QerFields {
    fn decode(value: &[u8]) -> Result<Self> {
        let mut fields = Self::default();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::QER_ID => fields.qer_id = Some(ie.as_u32()?),
                types::GATE_STATUS => fields.gate_status = Some(ie.decode()?),
                types::QER_CORRELATION_ID => fields.qer_correlation_id = Some(ie.as_u32()?),
                types::MBR => fields.mbr = Some(Bitrate::decode_as(types::MBR, &ie.value)?),
                types::GBR => fields.gbr = Some(Bitrate::decode_as(types::GBR, &ie.value)?),
                types::QFI => fields.qfi = Some(ie.as_u8()? & 0x3f),
                types::RQI => fields.rqi = ie.as_u8()? & 0x01 != 0,
                types::PAGING_POLICY_INDICATOR => fields.ppi = Some(ie.as_u8()?),
                _ => {}
            }
        }
        Ok(fields)
    }
}

impl IeDecode for CreateQer {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let fields = QerFields::decode(value)?;
        Ok(Self {
            qer_id: fields.qer_id.ok_or(PfcpError::MissingIe(types::QER_ID))?,
            gate_status: fields
                .gate_status
                .ok_or(PfcpError::MissingIe(types::GATE_STATUS))?,
            qer_correlation_id: fields.qer_correlation_id,
            mbr: fields.mbr,
            gbr: fields.gbr,
            qfi: fields.qfi,
            rqi: fields.rqi,
            ppi: fields.ppi,
        })
    }
}

/// Update QER (type 14)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateQer {
    /// Rule identifier
    pub qer_id: u32,
    /// New correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qer_correlation_id: Option<u32>,
    /// New gate state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_status: Option<GateStatus>,
    /// New maximum bit rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbr: Option<Bitrate>,
    /// New guaranteed bit rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gbr: Option<Bitrate>,
    /// New QoS flow identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qfi: Option<u8>,
    /// Reflective QoS
    pub rqi: bool,
    /// New paging policy indicator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppi: Option<u8>,
}

impl IeEncode for UpdateQer {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::UPDATE_QER, |buf| {
            put_u32_ie(buf, types::QER_ID, self.qer_id)?;
            if let Some(id) = self.qer_correlation_id {
                put_u32_ie(buf, types::QER_CORRELATION_ID, id)?;
            }
            if let Some(gate) = &self.gate_status {
                gate.encode_ie(buf)?;
            }
            if let Some(mbr) = &self.mbr {
                mbr.encode_as(buf, types::MBR)?;
            }
            if let Some(gbr) = &self.gbr {
                gbr.encode_as(buf, types::GBR)?;
            }
            put_qos_tail(buf, self.qfi, self.rqi, self.ppi)
        })
    }
}

impl IeDecode for UpdateQer {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let fields = QerFields::decode(value)?;
        Ok(Self {
            qer_id: fields.qer_id.ok_or(PfcpError::MissingIe(types::QER_ID))?,
            qer_correlation_id: fields.qer_correlation_id,
            gate_status: fields.gate_status,
            mbr: fields.mbr,
            gbr: fields.gbr,
            qfi: fields.qfi,
            rqi: fields.rqi,
            ppi: fields.ppi,
        })
    }
}

/// Remove QER (type 18)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveQer {
    /// Rule to remove
    pub qer_id: u32,
}

impl IeEncode for RemoveQer {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::REMOVE_QER, |buf| {
            put_u32_ie(buf, types::QER_ID, self.qer_id)
        })
    }
}

impl IeDecode for RemoveQer {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let qer_id = QerFields::decode(value)?
            .qer_id
            .ok_or(PfcpError::MissingIe(types::QER_ID))?;
        Ok(Self { qer_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: IeEncode>(ie: &T) -> BytesMut {
        let mut buf = BytesMut::new();
        ie.encode_ie(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_gate_status_bits() {
        let closed_ul = GateStatus {
            ul_open: false,
            dl_open: true,
        };
        assert_eq!(&encode(&closed_ul)[..], &[0x00, 0x19, 0x00, 0x01, 0x04]);
        assert_eq!(&encode(&GateStatus::OPEN)[4..], &[0x00]);

        let both_closed = GateStatus::decode_ie(&[0x05]).unwrap();
        assert!(!both_closed.ul_open && !both_closed.dl_open);
    }

    #[test]
    fn test_bitrate_five_bytes_each() {
        let qer = CreateQer {
            mbr: Some(Bitrate {
                ul: 0x01_0203_0405,
                dl: 1_000_000,
            }),
            ..CreateQer::new(1)
        };
        let buf = encode(&qer);
        let children = parse_ies(&buf[4..]).unwrap();
        let mbr = children.iter().find(|ie| ie.ie_type == types::MBR).unwrap();
        assert_eq!(mbr.value.len(), 10);
        assert_eq!(&mbr.value[..5], &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(CreateQer::decode_ie(&buf[4..]).unwrap(), qer);
    }

    #[test]
    fn test_update_qer_uses_same_bitrate_layout() {
        let update = UpdateQer {
            qer_id: 3,
            gbr: Some(Bitrate { ul: 64, dl: 128 }),
            ..Default::default()
        };
        let buf = encode(&update);
        let children = parse_ies(&buf[4..]).unwrap();
        assert_eq!(children[1].ie_type, types::GBR);
        assert_eq!(children[1].value.len(), 10);
        assert_eq!(UpdateQer::decode_ie(&buf[4..]).unwrap(), update);
    }

    #[test]
    fn test_bitrate_overflow_rejected() {
        let qer = CreateQer {
            mbr: Some(Bitrate {
                ul: Bitrate::MAX + 1,
                dl: 0,
            }),
            ..CreateQer::new(1)
        };
        let mut buf = BytesMut::new();
        assert!(qer.encode_ie(&mut buf).is_err());
    }

    #[test]
    fn test_create_qer_child_order() {
        let qer = CreateQer {
            qer_correlation_id: Some(7),
            qfi: Some(9),
            rqi: true,
            ppi: Some(2),
            ..CreateQer::new(1)
        };
        let buf = encode(&qer);
        let order: Vec<u16> = parse_ies(&buf[4..])
            .unwrap()
            .iter()
            .map(|ie| ie.ie_type)
            .collect();
        assert_eq!(
            order,
            vec![
                types::QER_ID,
                types::GATE_STATUS,
                types::QER_CORRELATION_ID,
                types::QFI,
                types::RQI,
                types::PAGING_POLICY_INDICATOR,
            ]
        );
        assert_eq!(CreateQer::decode_ie(&buf[4..]).unwrap(), qer);
    }

    #[test]
    fn test_remove_qer() {
        let buf = encode(&RemoveQer { qer_id: 5 });
        assert_eq!(&buf[..2], &[0x00, 0x12]);
        assert_eq!(RemoveQer::decode_ie(&buf[4..]).unwrap().qer_id, 5);
    }
}
