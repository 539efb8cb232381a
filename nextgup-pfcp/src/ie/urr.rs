//! Usage Reporting Rule IEs

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{parse_ies, put_group, put_ie, put_u32_ie, types, IeDecode, IeEncode, ValueReader};
use crate::error::{PfcpError, Result};

/// Measurement Method (type 62)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementMethod {
    /// Measure duration
    pub duration: bool,
    /// Measure volume
    pub volume: bool,
    /// Report events
    pub event: bool,
}

impl MeasurementMethod {
    const DURAT: u8 = 0x01;
    const VOLUM: u8 = 0x02;
    const EVENT: u8 = 0x04;
}

impl IeEncode for MeasurementMethod {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut flags = 0;
        if self.duration {
            flags |= Self::DURAT;
        }
        if self.volume {
            flags |= Self::VOLUM;
        }
        if self.event {
            flags |= Self::EVENT;
        }
        put_ie(buf, types::MEASUREMENT_METHOD, &[flags])
    }
}

impl IeDecode for MeasurementMethod {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let flags = ValueReader::new(types::MEASUREMENT_METHOD, value).u8()?;
        Ok(Self {
            duration: flags & Self::DURAT != 0,
            volume: flags & Self::VOLUM != 0,
            event: flags & Self::EVENT != 0,
        })
    }
}

/// Volume Threshold (type 31), in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeThreshold {
    /// Total volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Uplink volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uplink: Option<u64>,
    /// Downlink volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink: Option<u64>,
}

impl VolumeThreshold {
    const TOVOL: u8 = 0x01;
    const ULVOL: u8 = 0x02;
    const DLVOL: u8 = 0x04;
}

impl IeEncode for VolumeThreshold {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut value = BytesMut::with_capacity(25);
        value.put_u8(0);
        let mut flags = 0;
        for (volume, flag) in [
            (self.total, Self::TOVOL),
            (self.uplink, Self::ULVOL),
            (self.downlink, Self::DLVOL),
        ] {
            if let Some(volume) = volume {
                flags |= flag;
                value.put_u64(volume);
            }
        }
        value[0] = flags;
        put_ie(buf, types::VOLUME_THRESHOLD, &value)
    }
}

impl IeDecode for VolumeThreshold {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::VOLUME_THRESHOLD, value);
        let flags = reader.u8()?;
        let mut read = |flag: u8| -> Result<Option<u64>> {
            if flags & flag != 0 {
                reader.u64().map(Some)
            } else {
                Ok(None)
            }
        };
        let total = read(Self::TOVOL)?;
        let uplink = read(Self::ULVOL)?;
        let downlink = read(Self::DLVOL)?;
        Ok(Self {
            total,
            uplink,
            downlink,
        })
    }
}

/// Create URR (type 6)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUrr {
    /// Rule identifier
    pub urr_id: u32,
    /// What to measure
    pub measurement_method: MeasurementMethod,
    /// Reporting Triggers octets, passed through as given
    #[serde(default)]
    pub reporting_triggers: Vec<u8>,
    /// Threshold that triggers a report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_threshold: Option<VolumeThreshold>,
}

impl IeEncode for CreateUrr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::CREATE_URR, |buf| {
            put_u32_ie(buf, types::URR_ID, self.urr_id)?;
            self.measurement_method.encode_ie(buf)?;
            put_ie(buf, types::REPORTING_TRIGGERS, &self.reporting_triggers)?;
            if let Some(threshold) = &self.volume_threshold {
                threshold.encode_ie(buf)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for CreateUrr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut urr_id = None;
        let mut measurement_method = None;
        let mut reporting_triggers = Vec::new();
        let mut volume_threshold = None;
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::URR_ID => urr_id = Some(ie.as_u32()?),
                types::MEASUREMENT_METHOD => measurement_method = Some(ie.decode()?),
                types::REPORTING_TRIGGERS => reporting_triggers = ie.value.to_vec(),
                types::VOLUME_THRESHOLD => volume_threshold = Some(ie.decode()?),
                _ => {}
            }
        }
        Ok(Self {
            urr_id: urr_id.ok_or(PfcpError::MissingIe(types::URR_ID))?,
            measurement_method: measurement_method
                .ok_or(PfcpError::MissingIe(types::MEASUREMENT_METHOD))?,
            reporting_triggers,
            volume_threshold,
        })
    }
}

/// Update URR (type 13)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUrr {
    /// Rule identifier
    pub urr_id: u32,
    /// New measurement method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_method: Option<MeasurementMethod>,
    /// New reporting triggers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporting_triggers: Option<Vec<u8>>,
    /// New volume threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_threshold: Option<VolumeThreshold>,
}

impl IeEncode for UpdateUrr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::UPDATE_URR, |buf| {
            put_u32_ie(buf, types::URR_ID, self.urr_id)?;
            if let Some(method) = &self.measurement_method {
                method.encode_ie(buf)?;
            }
            if let Some(triggers) = &self.reporting_triggers {
                put_ie(buf, types::REPORTING_TRIGGERS, triggers)?;
            }
            if let Some(threshold) = &self.volume_threshold {
                threshold.encode_ie(buf)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for UpdateUrr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut urr_id = None;
        let mut update = Self::default();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::URR_ID => urr_id = Some(ie.as_u32()?),
                types::MEASUREMENT_METHOD => update.measurement_method = Some(ie.decode()?),
                types::REPORTING_TRIGGERS => update.reporting_triggers = Some(ie.value.to_vec()),
                types::VOLUME_THRESHOLD => update.volume_threshold = Some(ie.decode()?),
                _ => {}
            }
        }
        update.urr_id = urr_id.ok_or(PfcpError::MissingIe(types::URR_ID))?;
        Ok(update)
    }
}

/// Remove URR (type 77)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveUrr {
    /// Rule to remove
    pub urr_id: u32,
}

impl IeEncode for RemoveUrr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::REMOVE_URR, |buf| {
            put_u32_ie(buf, types::URR_ID, self.urr_id)
        })
    }
}

impl IeDecode for RemoveUrr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let urr_id = parse_ies(value)?
            .into_iter()
            .find(|ie| ie.ie_type == types::URR_ID)
            .ok_or(PfcpError::MissingIe(types::URR_ID))?
            .as_u32()?;
        Ok(Self { urr_id })
    }
}
