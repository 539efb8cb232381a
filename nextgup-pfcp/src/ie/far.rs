//! Forwarding Action Rule IEs

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use super::{
    parse_ies, put_group, put_ie, put_str_ie, put_u32_ie, put_u8_ie, types, IeDecode, IeEncode,
    Interface, ValueReader,
};
use crate::error::{PfcpError, Result};

/// Apply Action (type 44)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
pub struct ApplyAction {
    /// Drop
    pub drop: bool,
    /// Forward
    pub forw: bool,
    /// Buffer
    pub buff: bool,
    /// Notify the CP function
    pub nocp: bool,
    /// Duplicate
    pub dupl: bool,
    /// IP multicast accept
    pub ipma: bool,
    /// IP multicast deny
    pub ipmd: bool,
    /// Duplicate for redundant transmission
    pub dfrt: bool,
    /// Eliminate duplicate packets
    pub edrt: bool,
    /// Buffered downlink packet notification
    pub bdpn: bool,
    /// Discarded downlink packet notification
    pub ddpn: bool,
}

impl ApplyAction {
    /// Forward only
    pub fn forward() -> Self {
        Self {
            forw: true,
            ..Self::default()
        }
    }

    /// Buffer and notify the CP function
    pub fn buffer_and_notify() -> Self {
        Self {
            buff: true,
            nocp: true,
            ..Self::default()
        }
    }

    fn octets(&self) -> [u8; 2] {
        let first = [
            (self.drop, 0x01),
            (self.forw, 0x02),
            (self.buff, 0x04),
            (self.nocp, 0x08),
            (self.dupl, 0x10),
            (self.ipma, 0x20),
            (self.ipmd, 0x40),
            (self.dfrt, 0x80),
        ];
        let second = [(self.edrt, 0x01), (self.bdpn, 0x02), (self.ddpn, 0x04)];
        let pack = |bits: &[(bool, u8)]| {
            bits.iter()
                .filter(|(set, _)| *set)
                .fold(0u8, |acc, (_, bit)| acc | bit)
        };
        [pack(&first), pack(&second)]
    }
}

impl IeEncode for ApplyAction {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let octets = self.octets();
        if octets[1] == 0 {
            put_ie(buf, types::APPLY_ACTION, &octets[..1])
        } else {
            put_ie(buf, types::APPLY_ACTION, &octets)
        }
    }
}

impl IeDecode for ApplyAction {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::APPLY_ACTION, value);
        let first = reader.u8()?;
        let second = reader.remaining().first().copied().unwrap_or(0);
        Ok(Self {
            drop: first & 0x01 != 0,
            forw: first & 0x02 != 0,
            buff: first & 0x04 != 0,
            nocp: first & 0x08 != 0,
            dupl: first & 0x10 != 0,
            ipma: first & 0x20 != 0,
            ipmd: first & 0x40 != 0,
            dfrt: first & 0x80 != 0,
            edrt: second & 0x01 != 0,
            bdpn: second & 0x02 != 0,
            ddpn: second & 0x04 != 0,
        })
    }
}

/// Header stack named by an Outer Header Creation description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OuterHeader {
    /// GTP-U/UDP/IP towards `teid`
    #[serde(rename_all = "camelCase")]
    GtpU {
        /// Remote TEID
        teid: u32,
        /// Remote IPv4 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv4: Option<Ipv4Addr>,
        /// Remote IPv6 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv6: Option<Ipv6Addr>,
    },
    /// UDP/IP towards `port`
    #[serde(rename_all = "camelCase")]
    Udp {
        /// Remote IPv4 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv4: Option<Ipv4Addr>,
        /// Remote IPv6 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv6: Option<Ipv6Addr>,
        /// Remote UDP port
        port: u16,
    },
    /// Plain IP encapsulation
    #[serde(rename_all = "camelCase")]
    Ip {
        /// Remote IPv4 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv4: Option<Ipv4Addr>,
        /// Remote IPv6 address
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ipv6: Option<Ipv6Addr>,
    },
    /// Customer VLAN tag
    CTag(u16),
    /// Service VLAN tag
    STag(u16),
}

/// Outer Header Creation (type 84)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuterHeaderCreation {
    /// Header to push
    pub header: OuterHeader,
    /// Forward over N19
    #[serde(default)]
    pub n19: bool,
    /// Forward over N6
    #[serde(default)]
    pub n6: bool,
}

impl OuterHeaderCreation {
    const GTPU_IPV4: u8 = 0x01;
    const GTPU_IPV6: u8 = 0x02;
    const UDP_IPV4: u8 = 0x04;
    const UDP_IPV6: u8 = 0x08;
    const IPV4: u8 = 0x10;
    const IPV6: u8 = 0x20;
    const CTAG: u8 = 0x40;
    const STAG: u8 = 0x80;
    const N19: u8 = 0x01;
    const N6: u8 = 0x02;

    /// GTP-U encapsulation towards an IPv4 peer
    pub fn gtpu_ipv4(teid: u32, peer: Ipv4Addr) -> Self {
        Self {
            header: OuterHeader::GtpU {
                teid,
                ipv4: Some(peer),
                ipv6: None,
            },
            n19: false,
            n6: false,
        }
    }
}

fn put_addresses(
    value: &mut BytesMut,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    bits: (u8, u8),
) -> u8 {
    let mut description = 0;
    if let Some(v4) = ipv4 {
        description |= bits.0;
        value.put_slice(&v4.octets());
    }
    if let Some(v6) = ipv6 {
        description |= bits.1;
        value.put_slice(&v6.octets());
    }
    description
}

impl IeEncode for OuterHeaderCreation {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        let mut fields = BytesMut::with_capacity(26);
        let description = match self.header {
            OuterHeader::GtpU { teid, ipv4, ipv6 } => {
                fields.put_u32(teid);
                put_addresses(&mut fields, ipv4, ipv6, (Self::GTPU_IPV4, Self::GTPU_IPV6))
            }
            OuterHeader::Udp { ipv4, ipv6, port } => {
                let description =
                    put_addresses(&mut fields, ipv4, ipv6, (Self::UDP_IPV4, Self::UDP_IPV6));
                fields.put_u16(port);
                description
            }
            OuterHeader::Ip { ipv4, ipv6 } => {
                put_addresses(&mut fields, ipv4, ipv6, (Self::IPV4, Self::IPV6))
            }
            OuterHeader::CTag(tag) => {
                fields.put_u16(tag);
                Self::CTAG
            }
            OuterHeader::STag(tag) => {
                fields.put_u16(tag);
                Self::STAG
            }
        };

        let mut interfaces = 0;
        if self.n19 {
            interfaces |= Self::N19;
        }
        if self.n6 {
            interfaces |= Self::N6;
        }

        let mut value = BytesMut::with_capacity(2 + fields.len());
        value.put_u8(description);
        value.put_u8(interfaces);
        value.put_slice(&fields);
        put_ie(buf, types::OUTER_HEADER_CREATION, &value)
    }
}

fn read_addresses(
    reader: &mut ValueReader<'_>,
    description: u8,
    bits: (u8, u8),
) -> Result<(Option<Ipv4Addr>, Option<Ipv6Addr>)> {
    let ipv4 = if description & bits.0 != 0 {
        Some(Ipv4Addr::from(reader.take::<4>()?))
    } else {
        None
    };
    let ipv6 = if description & bits.1 != 0 {
        Some(Ipv6Addr::from(reader.take::<16>()?))
    } else {
        None
    };
    Ok((ipv4, ipv6))
}

impl IeDecode for OuterHeaderCreation {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut reader = ValueReader::new(types::OUTER_HEADER_CREATION, value);
        let description = reader.u8()?;
        let interfaces = reader.u8()?;

        let header = if description & (Self::GTPU_IPV4 | Self::GTPU_IPV6) != 0 {
            let teid = reader.u32()?;
            let (ipv4, ipv6) =
                read_addresses(&mut reader, description, (Self::GTPU_IPV4, Self::GTPU_IPV6))?;
            OuterHeader::GtpU { teid, ipv4, ipv6 }
        } else if description & (Self::UDP_IPV4 | Self::UDP_IPV6) != 0 {
            let (ipv4, ipv6) =
                read_addresses(&mut reader, description, (Self::UDP_IPV4, Self::UDP_IPV6))?;
            let port = reader.u16()?;
            OuterHeader::Udp { ipv4, ipv6, port }
        } else if description & (Self::IPV4 | Self::IPV6) != 0 {
            let (ipv4, ipv6) = read_addresses(&mut reader, description, (Self::IPV4, Self::IPV6))?;
            OuterHeader::Ip { ipv4, ipv6 }
        } else if description & Self::CTAG != 0 {
            OuterHeader::CTag(reader.u16()?)
        } else if description & Self::STAG != 0 {
            OuterHeader::STag(reader.u16()?)
        } else {
            return Err(PfcpError::InvalidIeValue {
                ie_type: types::OUTER_HEADER_CREATION,
                reason: "empty description".into(),
            });
        };

        Ok(Self {
            header,
            n19: interfaces & Self::N19 != 0,
            n6: interfaces & Self::N6 != 0,
        })
    }
}

/// Forwarding Parameters (type 4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingParameters {
    /// Interface to forward on
    pub destination_interface: Interface,
    /// Network instance name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_instance: Option<String>,
    /// Header to push before forwarding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_header_creation: Option<OuterHeaderCreation>,
    /// DSCP/ToS value for the outer header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_level_marking: Option<u8>,
}

impl ForwardingParameters {
    /// Parameters naming only the destination interface
    pub fn new(destination_interface: Interface) -> Self {
        Self {
            destination_interface,
            network_instance: None,
            outer_header_creation: None,
            transport_level_marking: None,
        }
    }
}

fn put_forwarding_fields(
    buf: &mut BytesMut,
    destination_interface: Option<Interface>,
    network_instance: Option<&str>,
    outer_header_creation: Option<&OuterHeaderCreation>,
    transport_level_marking: Option<u8>,
) -> Result<()> {
    if let Some(interface) = destination_interface {
        put_u8_ie(buf, types::DESTINATION_INTERFACE, interface.destination_code())?;
    }
    if let Some(instance) = network_instance {
        put_str_ie(buf, types::NETWORK_INSTANCE, instance)?;
    }
    if let Some(creation) = outer_header_creation {
        creation.encode_ie(buf)?;
    }
    if let Some(tos) = transport_level_marking {
        put_ie(buf, types::TRANSPORT_LEVEL_MARKING, &[tos, 0xfc])?;
    }
    Ok(())
}

/// Fields shared by Forwarding Parameters and Update Forwarding Parameters
#[derive(Default)]
struct ForwardingFields {
    destination_interface: Option<Interface>,
    network_instance: Option<String>,
    outer_header_creation: Option<OuterHeaderCreation>,
    transport_level_marking: Option<u8>,
}

impl ForwardingFields {
    fn decode(value: &[u8]) -> Result<Self> {
        let mut fields = Self::default();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::DESTINATION_INTERFACE => {
                    let code = ie.as_u8()? & 0x0f;
                    fields.destination_interface =
                        Some(Interface::from_destination_code(code).ok_or_else(|| {
                            PfcpError::InvalidIeValue {
                                ie_type: types::DESTINATION_INTERFACE,
                                reason: format!("unknown interface code {code}"),
                            }
                        })?);
                }
                types::NETWORK_INSTANCE => fields.network_instance = Some(ie.as_string()?),
                types::OUTER_HEADER_CREATION => fields.outer_header_creation = Some(ie.decode()?),
                types::TRANSPORT_LEVEL_MARKING => fields.transport_level_marking = Some(ie.as_u8()?),
                _ => {}
            }
        }
        Ok(fields)
    }
}

impl IeEncode for ForwardingParameters {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::FORWARDING_PARAMETERS, |buf| {
            put_forwarding_fields(
                buf,
                Some(self.destination_interface),
                self.network_instance.as_deref(),
                self.outer_header_creation.as_ref(),
                self.transport_level_marking,
            )
        })
    }
}

impl IeDecode for ForwardingParameters {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let fields = ForwardingFields::decode(value)?;
        Ok(Self {
            destination_interface: fields
                .destination_interface
                .ok_or(PfcpError::MissingIe(types::DESTINATION_INTERFACE))?,
            network_instance: fields.network_instance,
            outer_header_creation: fields.outer_header_creation,
            transport_level_marking: fields.transport_level_marking,
        })
    }
}

/// Update Forwarding Parameters (type 11)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateForwardingParameters {
    /// New destination interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_interface: Option<Interface>,
    /// New network instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_instance: Option<String>,
    /// New outer header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_header_creation: Option<OuterHeaderCreation>,
    /// New transport level marking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_level_marking: Option<u8>,
}

impl IeEncode for UpdateForwardingParameters {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::UPDATE_FORWARDING_PARAMETERS, |buf| {
            put_forwarding_fields(
                buf,
                self.destination_interface,
                self.network_instance.as_deref(),
                self.outer_header_creation.as_ref(),
                self.transport_level_marking,
            )
        })
    }
}

impl IeDecode for UpdateForwardingParameters {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let fields = ForwardingFields::decode(value)?;
        Ok(Self {
            destination_interface: fields.destination_interface,
            network_instance: fields.network_instance,
            outer_header_creation: fields.outer_header_creation,
            transport_level_marking: fields.transport_level_marking,
        })
    }
}

/// Create FAR (type 3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFar {
    /// Rule identifier
    pub far_id: u32,
    /// What to do with matched packets
    pub apply_action: ApplyAction,
    /// Where to forward
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarding_parameters: Option<ForwardingParameters>,
    /// Buffering rule for buffered packets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_id: Option<u8>,
}

impl IeEncode for CreateFar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::CREATE_FAR, |buf| {
            put_u32_ie(buf, types::FAR_ID, self.far_id)?;
            self.apply_action.encode_ie(buf)?;
            if let Some(params) = &self.forwarding_parameters {
                params.encode_ie(buf)?;
            }
            if let Some(bar_id) = self.bar_id {
                put_u8_ie(buf, types::BAR_ID, bar_id)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for CreateFar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut far_id = None;
        let mut apply_action = None;
        let mut forwarding_parameters = None;
        let mut bar_id = None;
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::FAR_ID => far_id = Some(ie.as_u32()?),
                types::APPLY_ACTION => apply_action = Some(ie.decode()?),
                types::FORWARDING_PARAMETERS => forwarding_parameters = Some(ie.decode()?),
                types::BAR_ID => bar_id = Some(ie.as_u8()?),
                _ => {}
            }
        }
        Ok(Self {
            far_id: far_id.ok_or(PfcpError::MissingIe(types::FAR_ID))?,
            apply_action: apply_action.ok_or(PfcpError::MissingIe(types::APPLY_ACTION))?,
            forwarding_parameters,
            bar_id,
        })
    }
}

/// Update FAR (type 10)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateFar {
    /// Rule identifier
    pub far_id: u32,
    /// New action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_action: Option<ApplyAction>,
    /// Forwarding changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_forwarding_parameters: Option<UpdateForwardingParameters>,
    /// New buffering rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_id: Option<u8>,
}

impl IeEncode for UpdateFar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::UPDATE_FAR, |buf| {
            put_u32_ie(buf, types::FAR_ID, self.far_id)?;
            if let Some(action) = &self.apply_action {
                action.encode_ie(buf)?;
            }
            if let Some(params) = &self.update_forwarding_parameters {
                params.encode_ie(buf)?;
            }
            if let Some(bar_id) = self.bar_id {
                put_u8_ie(buf, types::BAR_ID, bar_id)?;
            }
            Ok(())
        })
    }
}

impl IeDecode for UpdateFar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let mut far_id = None;
        let mut update = Self::default();
        for ie in parse_ies(value)? {
            match ie.ie_type {
                types::FAR_ID => far_id = Some(ie.as_u32()?),
                types::APPLY_ACTION => update.apply_action = Some(ie.decode()?),
                types::UPDATE_FORWARDING_PARAMETERS => {
                    update.update_forwarding_parameters = Some(ie.decode()?)
                }
                types::BAR_ID => update.bar_id = Some(ie.as_u8()?),
                _ => {}
            }
        }
        update.far_id = far_id.ok_or(PfcpError::MissingIe(types::FAR_ID))?;
        Ok(update)
    }
}

/// Remove FAR (type 16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFar {
    /// Rule to remove
    pub far_id: u32,
}

impl IeEncode for RemoveFar {
    fn encode_ie(&self, buf: &mut BytesMut) -> Result<()> {
        put_group(buf, types::REMOVE_FAR, |buf| {
            put_u32_ie(buf, types::FAR_ID, self.far_id)
        })
    }
}

impl IeDecode for RemoveFar {
    fn decode_ie(value: &[u8]) -> Result<Self> {
        let far_id = parse_ies(value)?
            .into_iter()
            .find(|ie| ie.ie_type == types::FAR_ID)
            .ok_or(PfcpError::MissingIe(types::FAR_ID))?
            .as_u32()?;
        Ok(Self { far_id })
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
    fn test_apply_action_length() {
        assert_eq!(
            &encode(&ApplyAction::forward())[..],
            &[0x00, 0x2c, 0x00, 0x01, 0x02]
        );

        let action = ApplyAction {
            buff: true,
            nocp: true,
            bdpn: true,
            ..Default::default()
        };
        let buf = encode(&action);
        assert_eq!(&buf[..], &[0x00, 0x2c, 0x00, 0x02, 0x0c, 0x02]);
        assert_eq!(ApplyAction::decode_ie(&buf[4..]).unwrap(), action);
    }

    #[test]
    fn test_apply_action_every_flag() {
        let all = ApplyAction {
            drop: true,
            forw: true,
            buff: true,
            nocp: true,
            dupl: true,
            ipma: true,
            ipmd: true,
            dfrt: true,
            edrt: true,
            bdpn: true,
            ddpn: true,
        };
        let buf = encode(&all);
        assert_eq!(&buf[4..], &[0xff, 0x07]);
        assert_eq!(ApplyAction::decode_ie(&buf[4..]).unwrap(), all);
    }

    #[test]
    fn test_outer_header_creation_gtpu() {
        let creation = OuterHeaderCreation::gtpu_ipv4(0xdeadbeef, Ipv4Addr::new(10, 0, 0, 2));
        let buf = encode(&creation);
        assert_eq!(
            &buf[..],
            &[0x00, 0x54, 0x00, 0x0a, 0x01, 0x00, 0xde, 0xad, 0xbe, 0xef, 10, 0, 0, 2]
        );
        assert_eq!(OuterHeaderCreation::decode_ie(&buf[4..]).unwrap(), creation);
    }

    #[test]
    fn test_outer_header_creation_variants() {
        let cases = [
            OuterHeaderCreation {
                header: OuterHeader::Udp {
                    ipv4: Some(Ipv4Addr::new(10, 0, 0, 9)),
                    ipv6: None,
                    port: 5000,
                },
                n19: false,
                n6: true,
            },
            OuterHeaderCreation {
                header: OuterHeader::Ip {
                    ipv4: None,
                    ipv6: Some(Ipv6Addr::LOCALHOST),
                },
                n19: true,
                n6: false,
            },
            OuterHeaderCreation {
                header: OuterHeader::CTag(0x0123),
                n19: false,
                n6: false,
            },
            OuterHeaderCreation {
                header: OuterHeader::STag(0x0456),
                n19: false,
                n6: false,
            },
        ];
        for creation in cases {
            let buf = encode(&creation);
            assert_eq!(OuterHeaderCreation::decode_ie(&buf[4..]).unwrap(), creation);
        }

        let udp = encode(&cases[0]);
        assert_eq!(&udp[4..6], &[0x04, 0x02]);
        assert_eq!(&udp[10..12], &5000u16.to_be_bytes());
    }

    #[test]
    fn test_transport_level_marking_inside_forwarding_parameters() {
        let params = ForwardingParameters {
            transport_level_marking: Some(0xb8),
            ..ForwardingParameters::new(Interface::Access)
        };
        let buf = encode(&params);
        assert_eq!(
            &buf[..],
            &[
                0x00, 0x04, 0x00, 0x0b, // forwarding parameters
                0x00, 0x2a, 0x00, 0x01, 0x00, // destination interface
                0x00, 0x1e, 0x00, 0x02, 0xb8, 0xfc, // transport level marking
            ]
        );
        assert_eq!(ForwardingParameters::decode_ie(&buf[4..]).unwrap(), params);
    }

    #[test]
    fn test_destination_interface_codes() {
        for interface in Interface::ALL {
            let buf = encode(&ForwardingParameters::new(*interface));
            assert_eq!(buf[8], interface.destination_code());
        }
        let li = encode(&ForwardingParameters::new(Interface::LiFunction));
        assert_eq!(li[8], 4);
    }

    #[test]
    fn test_create_far_with_bar() {
        let far = CreateFar {
            far_id: 2,
            apply_action: ApplyAction::buffer_and_notify(),
            forwarding_parameters: None,
            bar_id: Some(1),
        };
        let buf = encode(&far);
        let children: Vec<u16> = parse_ies(&buf[4..])
            .unwrap()
            .iter()
            .map(|ie| ie.ie_type)
            .collect();
        assert_eq!(children, vec![types::FAR_ID, types::APPLY_ACTION, types::BAR_ID]);
        assert_eq!(CreateFar::decode_ie(&buf[4..]).unwrap(), far);
    }

    #[test]
    fn test_update_far_forwarding() {
        let update = UpdateFar {
            far_id: 2,
            apply_action: Some(ApplyAction::forward()),
            update_forwarding_parameters: Some(UpdateForwardingParameters {
                outer_header_creation: Some(OuterHeaderCreation::gtpu_ipv4(
                    0x100,
                    Ipv4Addr::new(192, 168, 1, 10),
                )),
                ..Default::default()
            }),
            bar_id: None,
        };
        let buf = encode(&update);
        assert_eq!(UpdateFar::decode_ie(&buf[4..]).unwrap(), update);
    }

    #[test]
    fn test_remove_far() {
        let buf = encode(&RemoveFar { far_id: 9 });
        assert_eq!(
            &buf[..],
            &[0x00, 0x10, 0x00, 0x08, 0x00, 0x6c, 0x00, 0x04, 0x00, 0x00, 0x00, 0x09]
        );
        assert_eq!(RemoveFar::decode_ie(&buf[4..]).unwrap().far_id, 9);
    }

    #[test]
    fn test_apply_action_serde_names() {
        let action: ApplyAction = serde_yaml::from_str("FORW: true\nNOCP: true\n").unwrap();
        assert!(action.forw && action.nocp && !action.drop);
    }
}
