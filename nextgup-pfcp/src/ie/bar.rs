//! Buffering Action Rule IEs

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use super::{parse_ies, put_group, put_u8_ie, types, IeDecode, IeEncode};
use crate::error::{PfcpError, Result};

/// Create BAR (type 85)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBar {
    /// Rule identifier
    pub bar_id: u8,
    /// Packets the UP function should buffer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_buffering_packets_count: Option<u8>,
}

/// Update BAR (type 86)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBar {
    /// Rule identifier
    pub bar_id: u8,
    /// New suggested packet count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_buffering_packets_count: Option<u8>,
}

/// Remove BAR (type 87)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBar {
    /// Rule to remove
    pub bar_id: u8,
}

fn encode_bar(buf: &mut BytesMut, ie_type: u16, bar_id: u8, count: Option<u8>) -> Result<()> {
    put_group(buf, ie_type, |buf| {
        put_u8_ie(buf, types::BAR_ID, bar_id)?;
        if let Some(count) = count {
            put_u8_ie(buf, types::SUGGESTED_BUFFERING_PACKETS_COUNT, count)?;
        }
        Ok(())
    })
}

fn decode_bar(value: &[u8]) -> Result<(u8, Option<u8>)> {
    let mut bar_id = None;
    let mut count = None;
    for ie in parse_ies(value)? {
        match ie.ie_type {
            types::BAR_ID => bar_id = Some(ie.as_u8()?),
            types::SUGGESTED_BUFFERING_PACKETS_COUNT => count = Some(ie.as_u8()?),
            _ => {}
        }
    }
    Ok((bar_id.ok_or(PfcpError::MissingIe(types::BAR_ID))?, count))
}

impl IeEncode for CreateBar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        encode_bar(
            buf,
            types::CREATE_BAR,
            self.bar_id,
            self.suggested_buffering_packets_count,
        )
    }
}

impl IeDecode for CreateBar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let (bar_id, suggested_buffering_packets_count) = decode_bar(value)?;
        Ok(Self {
            bar_id,
            suggested_buffering_packets_count,
        })
    }
}

impl IeEncode for UpdateBar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        encode_bar(
            buf,
            types::UPDATE_BAR,
            self.bar_id,
            self.suggested_buffering_packets_count,
        )
    }
}

impl IeDecode for UpdateBar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let (bar_id, suggested_buffering_packets_count) = decode_bar(value)?;
        Ok(Self {
            bar_id,
            suggested_buffering_packets_count,
        })
    }
}

impl IeEncode for RemoveBar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        encode_bar(buf, types::REMOVE_BAR, self.bar_id, None)
    }
}

impl IeDecode for RemoveBar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        Ok(Self {
            bar_id: decode_bar(value)?.0,
        })
    }
}
