//! Packet Detection Rule IEs

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use super::{
    parse_ies, put_group, put_ie, put_str_ie, put_u16_ie, put_u32_ie, put_u8_ie, types, FTeid,
    IeDecode, IeEncode, Interface, OuterHeaderRemovalDescription, UeIpAddress, ValueReader,
};
use crate::error::{PfcpError, Result};

/// Packet Detection Information (type 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pdi {
    /// Interface the packet arrives on
    pub source_interface: Interface,
    /// Local tunnel endpoint to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_f_teid: Option<FTeid>,
    /// Network instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_instance: Option<String>,
    /// UE address to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ue_ip_address: Option<UeIpAddress>,
    /// QoS flow identifier to match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qfi: Option<u8>,
}

impl Pdi {
    /// PDI matching only on the source interface
    pub fn new(source_interface: Interface) -> Self {
        Self {
            source_interface,
            local_f_teid: None,
            network_instance: None,
            ue_ip_address: None,
            qfi: None,
        }
    }
}

impl IeEncode for Pdi {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let source = self
            .source_interface
            .source_code()
            .ok_or_else(|| PfcpError::InvalidIeValue {
                ie_type: types::SOURCE_INTERFACE,
                reason: format!("{} is not a source interface", self.source_interface),
            })?;
        put_group(buf, types::PDI, |buf| {
            put_u8_ie(buf, types::SOURCE_INTERFACE, source)?;
            if let Some(fteid) = &self.local_f_teid {
                fteid.encode_ie(buf)?;
            }
            if let Some(instance) = &self.network_instance {
                put_str_ie(buf, types::NETWORK_INSTANCE, instance)?;
            }
            if let Some(ue_ip) = &self.ue_ip_address {
                ue_ip.encode_ie(buf)?;
            }
            if let Some(qfi) = self.qfi {
                put_u8_ie(buf, types::QFI, qfi)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for Pdi {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut source_interface = None;
        let mut pdi = Self::new(Interface::Access);
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::SOURCE_INTERFACE => {
                    let code = ie.as_u8()? & 0x0f;
                    source_interface = Some(Interface::from_source_code(code).ok_or_else(
                        || PfcpError::InvalidIeValue {
                            ie_type: types::SOURCE_INTERFACE,
                            reason: format!("unknown interface code {code}"),
                        },
                    )?);
                }
                types::F_TEID => pdi.local_f_teid = Some(ie.decode()?),
                types::NETWORK_INSTANCE => pdi.network_instance = Some(ie.as_string()?),
                types::UE_IP_ADDRESS => pdi.ue_ip_address = Some(ie.decode()?),
                types::QFI => pdi.qfi = Some(ie.as_u8()? & 0x3f),
                _ => {}
            }
        }
        pdi.source_interface = source_interface.ok_or(PfcpError::MissingIe(types::SOURCE_INTERFACE))?;
        Ok(pdi)
    }
}

/// Outer Header Removal (type 95)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuterHeaderRemoval {
    /// Header stack to strip
    pub description: OuterHeaderRemovalDescription,
    /// Also strip the PDU Session Container extension header
    #[serde(default, rename = "sessionContainer")]
    pub remove_pdu_session_container: bool,
}

impl OuterHeaderRemoval {
    const PDU_SESSION_CONTAINER: u8 = 0x01;

    /// Removal of `description` without extension header handling
    pub fn new(description: OuterHeaderRemovalDescription) -> Self {
        Self {
            description,
            remove_pdu_session_container: false,
        }
    }
}

impl IeEncode for OuterHeaderRemoval {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let code = self.description.code();
        if self.remove_pdu_session_container {
            put_ie(buf, types::OUTER_HEADER_REMOVAL, &[code, Self::PDU_SESSION_CONTAINER])
        } else {
            put_ie(buf, types::OUTER_HEADER_REMOVAL, &[code])
        }
    }
}

impl IeDecode for OuterHeaderRemoval {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::OUTER_HEADER_REMOVAL, value);
        let code = reader.u8()?;
        let description =
            OuterHeaderRemovalDescription::from_code(code).ok_or_else(|| PfcpError::InvalidIeValue {
                ie_type: types::OUTER_HEADER_REMOVAL,
                reason: format!("unknown description {code}"),
            })?;
        let extension = reader.remaining().first().copied().unwrap_or(0);
        Ok(Self {
            description,
            remove_pdu_session_container: extension & Self::PDU_SESSION_CONTAINER != 0,
        })
    }
}

fn put_rule_links(
    buf: &mut BytesMut,
    far_id: Option<u32>,
    urr_ids: &[u32],
    qer_ids: &[u32],
) -> Result<()> {
    if let Some(far_id) = far_id {
        put_u32_ie(buf, types::FAR_ID, far_id)?;
    }
    for urr_id in urr_ids {
        put_u32_ie(buf, types::URR_ID, *urr_id)?;
    }
    for qer_id in qer_ids {
        put_u32_ie(buf, types::QER_ID, *qer_id)?;
    }
    Ok(())
}

/// Create PDR (type 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePdr {
    /// Rule identifier
    pub pdr_id: u16,
    /// Match precedence, lower wins
    pub precedence: u32,
    /// Packet detection information
    pub pdi: Pdi,
    /// Header to strip from matched packets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    /// Associated FAR
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub far_id: Option<u32>,
    /// Associated URRs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urr_ids: Vec<u32>,
    /// Associated QERs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qer_ids: Vec<u32>,
}

impl IeEncode for CreatePdr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::CREATE_PDR, |buf| {
            put_u16_ie(buf, types::PDR_ID, self.pdr_id)?;
            put_u32_ie(buf, types::PRECEDENCE, self.precedence)?;
            self.pdi.encode_ie(buf)?;
            if let Some(removal) = &self.outer_header_removal {
                removal.encode_ie(buf)?;
            }
            put_rule_links(buf, self.far_id, &self.urr_ids, &self.qer_ids)
        })
    }
}

impl IeDecode for CreatePdr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut pdr_id = None;
        let mut precedence = None;
        let mut pdi = None;
        let mut outer_header_removal = None;
        let mut far_id = None;
        let mut urr_ids = Vec::new();
        let mut qer_ids = Vec::new();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::PDR_ID => pdr_id = Some(ie.as_u16()?),
                types::PRECEDENCE => precedence = Some(ie.as_u32()?),
                types::PDI => pdi = Some(ie.decode()?),
                types::OUTER_HEADER_REMOVAL => outer_header_removal = Some(ie.decode()?),
                types::FAR_ID => far_id = Some(ie.as_u32()?),
                types::URR_ID => urr_ids.push(ie.as_u32()?),
                types::QER_ID => qer_ids.push(ie.as_u32()?),
                _ => {}
            }
        }
        Ok(Self {
            pdr_id: pdr_id.ok_or(PfcpError::MissingIe(types::PDR_ID))?,
            precedence: precedence.ok_or(PfcpError::MissingIe(types::PRECEDENCE))?,
            pdi: pdi.ok_or(PfcpError::MissingIe(types::PDI))?,
            outer_header_removal,
            far_id,
            urr_ids,
            qer_ids,
        })
    }
}

/// Update PDR (type 9)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePdr {
    /// Rule identifier
    pub pdr_id: u16,
    /// New header removal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_header_removal: Option<OuterHeaderRemoval>,
    /// New precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedence: Option<u32>,
    /// Replacement detection information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdi: Option<Pdi>,
    /// New FAR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub far_id: Option<u32>,
    /// URRs to associate
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urr_ids: Vec<u32>,
    /// QERs to associate
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qer_ids: Vec<u32>,
}

impl UpdatePdr {
    /// Update touching nothing but the rule id
    pub fn new(pdr_id: u16) -> Self {
        Self {
            pdr_id,
            ..Self::default()
        }
    }
}

impl IeEncode for UpdatePdr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::UPDATE_PDR, |buf| {
            put_u16_ie(buf, types::PDR_ID, self.pdr_id)?;
            if let Some(removal) = &self.outer_header_removal {
                removal.encode_ie(buf)?;
            }
            if let Some(precedence) = self.precedence {
                put_u32_ie(buf, types::PRECEDENCE, precedence)?;
            }
            if let Some(pdi) = &self.pdi {
                pdi.encode_ie(buf)?;
            }
            put_rule_links(buf, self.far_id, &self.urr_ids, &self.qer_ids)
        })
    }
}

impl IeDecode for UpdatePdr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut pdr_id = None;
        let mut update = Self::default();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::PDR_ID => pdr_id = Some(ie.as_u16()?),
                types::OUTER_HEADER_REMOVAL => update.outer_header_removal = Some(ie.decode()?),
                types::PRECEDENCE => update.precedence = Some(ie.as_u32()?),
                types::PDI => update.pdi = Some(ie.decode()?),
                types::FAR_ID => update.far_id = Some(ie.as_u32()?),
                types::URR_ID => update.urr_ids.push(ie.as_u32()?),
                types::QER_ID => update.qer_ids.push(ie.as_u32()?),
                _ => {}
            }
        }
        update.pdr_id = pdr_id.ok_or(PfcpError::MissingIe(types::PDR_ID))?;
        Ok(update)
    }
}

fn decode_pdr_id(value: &[u8]) -> Result<u16> {
    parse_ies(value)?
        .into_iter()
        .find(|ie| ie.ie_type == types::PDR_ID)
        .ok_or(PfcpError::MissingIe(types::PDR_ID))?
        .as_u16()
}

fn put_pdr_id_group(buf: &mut BytesMut, ie_type: u16, pdr_id: u16) -> Result<()> {
    put_group(buf, ie_type, |buf| put_u16_ie(buf, types::PDR_ID, pdr_id))
}

/// Remove PDR (type 15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePdr {
    /// Rule to remove
    pub pdr_id: u16,
}

impl IeEncode for RemovePdr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_pdr_id_group(buf, types::REMOVE_PDR, self.pdr_id)
    }
}

impl IeDecode for RemovePdr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        Ok(Self {
            pdr_id: decode_pdr_id(value)?,
        })
    }
}

/// Created PDR (type 8), returned in establishment and modification responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPdr {
    /// Rule identifier
    pub pdr_id: u16,
    /// Tunnel endpoint the peer allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_f_teid: Option<FTeid>,
    /// UE address the peer allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ue_ip_address: Option<UeIpAddress>,
}

impl IeEncode for CreatedPdr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::CREATED_PDR, |buf| {
            put_u16_ie(buf, types::PDR_ID, self.pdr_id)?;
            if let Some(fteid) = &self.local_f_teid {
                fteid.encode_ie(buf)?;
            }
            if let Some(ue_ip) = &self.ue_ip_address {
                ue_ip.encode_ie(buf)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for CreatedPdr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut pdr_id = None;
        let mut local_f_teid = None;
        let mut ue_ip_address = None;
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::PDR_ID => pdr_id = Some(ie.as_u16()?),
                types::F_TEID => local_f_teid = Some(ie.decode()?),
                types::UE_IP_ADDRESS => ue_ip_address = Some(ie.decode()?),
                _ => {}
            }
        }
        Ok(Self {
            pdr_id: pdr_id.ok_or(PfcpError::MissingIe(types::PDR_ID))?,
            local_f_teid,
            ue_ip_address,
        })
    }
}

/// Updated PDR (type 256)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedPdr {
    /// Rule identifier
    pub pdr_id: u16,
}

impl IeEncode for UpdatedPdr {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_pdr_id_group(buf, types::UPDATED_PDR, self.pdr_id)
    }
}

impl IeDecode for UpdatedPdr {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        Ok(Self {
            pdr_id: decode_pdr_id(value)?,
        })
    }
}
