//! Session report IEs

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{parse_ies, put_group, put_ie, put_u16_ie, put_u8_ie, types, IeDecode, IeEncode, ValueReader};
use crate::error::{PfcpError, Result};

/// Report Type (type 39)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
pub struct ReportType {
    /// Downlink data report
    pub dldr: bool,
    /// Usage report
    pub usar: bool,
    /// Error indication report
    pub erir: bool,
    /// User plane inactivity report
    pub upir: bool,
    /// TSC management information report
    pub tmir: bool,
    /// Session report
    pub sesr: bool,
    /// User plane initiated session release
    pub uisr: bool,
}

impl ReportType {
    const BITS: [u8; 7] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40];

    fn flags(&self) -> [bool; 7] {
        [
            self.dldr, self.usar, self.erir, self.upir, self.tmir, self.sesr, self.uisr,
        ]
    }
}

impl IeEncode for ReportType {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let value = self
            .flags()
            .iter()
            .zip(Self::BITS)
            .filter(|(set, _)| **set)
            .fold(0u8, |acc, (_, bit)| acc | bit);
        put_u8_ie(buf, types::REPORT_TYPE, value)
    }
}

impl IeDecode for ReportType {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let value = ValueReader::new(types::REPORT_TYPE, value).u8()?;
        let bit = |index: usize| value & Self::BITS[index] != 0;
        Ok(Self {
            dldr: bit(0),
            usar: bit(1),
            erir: bit(2),
            upir: bit(3),
            tmir: bit(4),
            sesr: bit(5),
            uisr: bit(6),
        })
    }
}

/// Downlink Data Report (type 83)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownlinkDataReport {
    /// PDR that matched the downlink packet
    pub pdr_id: u16,
    /// Paging policy indicator of the packet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppi: Option<u8>,
    /// QoS flow of the packet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qfi: Option<u8>,
    /// The packet was buffered
    #[serde(default)]
    pub buffered: bool,
    /// The packet was dropped
    #[serde(default)]
    pub dropped: bool,
}

impl DownlinkDataReport {
    const SERVICE_PPI: u8 = 0x01;
    const SERVICE_QFI: u8 = 0x02;
    const STATUS_DROP: u8 = 0x01;
    const STATUS_BUFF: u8 = 0x02;

    fn decode_service_information(&mut self, value: &[u8]) -> Result<()> {
        let mut reader = ValueReader::new(types::DL_DATA_SERVICE_INFORMATION, value);
        let flags = reader.u8()?;
        if flags & Self::SERVICE_PPI != 0 {
            self.ppi = Some(reader.u8()? & 0x3f);
        }
        if flags & Self::SERVICE_QFI != 0 {
            self.qfi = Some(reader.u8()? & 0x3f);
        }
        Ok(())
    }
}

impl IeEncode for DownlinkDataReport {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::DOWNLINK_DATA_REPORT, |buf| {
            put_u16_ie(buf, types::PDR_ID, self.pdr_id)?;
            if self.ppi.is_some() || self.qfi.is_some() {
                let mut value = BytesMut::with_capacity(3);
                value.put_u8(0);
                if let Some(ppi) = self.ppi {
                    value[0] |= Self::SERVICE_PPI;
                    value.put_u8(ppi & 0x3f);
                }
                if let Some(qfi) = self.qfi {
                    value[0] |= Self::SERVICE_QFI;
                    value.put_u8(qfi & 0x3f);
                }
                put_ie(buf, types::DL_DATA_SERVICE_INFORMATION, &value)?;
            }
            if self.buffered || self.dropped {
                let mut status = 0;
                if self.dropped {
                    status |= Self::STATUS_DROP;
                }
                if self.buffered {
                    status |= Self::STATUS_BUFF;
                }
                put_u8_ie(buf, types::DATA_STATUS, status)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for DownlinkDataReport {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut pdr_id = None;
        let mut report = Self {
            pdr_id: 0,
            ppi: None,
            qfi: None,
            buffered: false,
            dropped: false,
        };
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::PDR_ID => pdr_id = Some(ie.as_u16()?),
                types::DL_DATA_SERVICE_INFORMATION => report.decode_service_information(&ie.value)?,
                types::DATA_STATUS => {
                    let status = ie.as_u8()?;
                    report.dropped = status & Self::STATUS_DROP != 0;
                    report.buffered = status & Self::STATUS_BUFF != 0;
                }
                _ => {}
            }
        }
        report.pdr_id = pdr_id.ok_or(PfcpError::MissingIe(types::PDR_ID))?;
        Ok(report)
    }
}
