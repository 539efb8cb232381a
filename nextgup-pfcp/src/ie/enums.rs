//! Enumerated IE fields
//!
//! Each enumeration has a human-readable name table (used by `Display`,
//! `FromStr` and serde) and, separately, one or more wire code tables. The
//! name is what callers see in configuration; the wire code is what the peer
//! sees. Interface has two wire tables because Source Interface and
//! Destination Interface code the same concept differently.

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{put_u8_ie, types, IeDecode, IeEncode, ValueReader};
use crate::error::PfcpError;

/// A name that is not in an enumeration's name table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {name}")]
pub struct UnknownName {
    /// Enumeration name
    pub kind: &'static str,
    /// Rejected input
    pub name: String,
}

/// Declares an enum together with its name table.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Human-readable name
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(UnknownName {
                        kind: stringify!($name),
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

named_enum! {
    /// Network interface a rule refers to
    pub enum Interface {
        /// Access side (towards the RAN)
        Access => "Access",
        /// Core side
        Core => "Core",
        /// N6 / SGi LAN
        N6Lan => "N6-LAN",
        /// Control plane function
        CpFunction => "CP-function",
        /// Lawful interception function
        LiFunction => "LI-function",
        /// 5G VN internal
        VnInternal => "VN-Internal",
    }
}

impl Interface {
    /// Wire code in a Source Interface IE. LI-function cannot be a source.
    pub fn source_code(self) -> Option<u8> {
        match self {
            Self::Access => Some(0),
            Self::Core => Some(1),
            Self::N6Lan => Some(2),
            Self::CpFunction => Some(3),
            Self::VnInternal => Some(4),
            Self::LiFunction => None,
        }
    }

    /// Reverse of [`Interface::source_code`]
    pub fn from_source_code(code: u8) -> Option<Self> {
        match code & 0x0f {
            0 => Some(Self::Access),
            1 => Some(Self::Core),
            2 => Some(Self::N6Lan),
            3 => Some(Self::CpFunction),
            4 => Some(Self::VnInternal),
            _ => None,
        }
    }

    /// Wire code in a Destination Interface IE
    pub fn destination_code(self) -> u8 {
        match self {
            Self::Access => 0,
            Self::Core => 1,
            Self::N6Lan => 2,
            Self::CpFunction => 3,
            Self::LiFunction => 4,
            Self::VnInternal => 5,
        }
    }

    /// Reverse of [`Interface::destination_code`]
    pub fn from_destination_code(code: u8) -> Option<Self> {
        match code & 0x0f {
            0 => Some(Self::Access),
            1 => Some(Self::Core),
            2 => Some(Self::N6Lan),
            3 => Some(Self::CpFunction),
            4 => Some(Self::LiFunction),
            5 => Some(Self::VnInternal),
            _ => None,
        }
    }
}

named_enum! {
    /// PDN / PDU session type
    pub enum PdnType {
        /// IPv4 only
        Ipv4 => "IPv4",
        /// IPv6 only
        Ipv6 => "IPv6",
        /// Dual stack
        Ipv4v6 => "IPv4v6",
        /// Unstructured
        NonIp => "Non-IP",
        /// Ethernet
        Ethernet => "Ethernet",
    }
}

impl PdnType {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Self::Ipv4 => 1,
            Self::Ipv6 => 2,
            Self::Ipv4v6 => 3,
            Self::NonIp => 4,
            Self::Ethernet => 5,
        }
    }

    /// Reverse of [`PdnType::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        match code & 0x07 {
            1 => Some(Self::Ipv4),
            2 => Some(Self::Ipv6),
            3 => Some(Self::Ipv4v6),
            4 => Some(Self::NonIp),
            5 => Some(Self::Ethernet),
            _ => None,
        }
    }
}

named_enum! {
    /// Headers stripped by an Outer Header Removal
    pub enum OuterHeaderRemovalDescription {
        /// GTP-U/UDP/IPv4
        GtpUUdpIpv4 => "GTP-U/UDP/IPv4",
        /// GTP-U/UDP/IPv6
        GtpUUdpIpv6 => "GTP-U/UDP/IPv6",
        /// UDP/IPv4
        UdpIpv4 => "UDP/IPv4",
        /// UDP/IPv6
        UdpIpv6 => "UDP/IPv6",
        /// IPv4
        Ipv4 => "IPv4",
        /// IPv6
        Ipv6 => "IPv6",
        /// GTP-U/UDP/IP of either family
        GtpUUdpIp => "GTP-U/UDP/IP",
        /// VLAN S-TAG
        VlanSTag => "VLAN_S-TAG",
        /// S-TAG and C-TAG
        STagCTag => "S-TAG_C-TAG",
    }
}

impl OuterHeaderRemovalDescription {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Self::GtpUUdpIpv4 => 0,
            Self::GtpUUdpIpv6 => 1,
            Self::UdpIpv4 => 2,
            Self::UdpIpv6 => 3,
            Self::Ipv4 => 4,
            Self::Ipv6 => 5,
            Self::GtpUUdpIp => 6,
            Self::VlanSTag => 7,
            Self::STagCTag => 8,
        }
    }

    /// Reverse of [`OuterHeaderRemovalDescription::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.code() == code)
    }
}

named_enum! {
    /// Result code carried in a Cause IE
    pub enum Cause {
        /// Request accepted (success)
        RequestAccepted => "Request accepted",
        /// More usage reports to send
        MoreUsageReportToSend => "More Usage Report to send",
        /// Request rejected, reason unspecified
        RequestRejected => "Request rejected",
        /// Session context not found
        SessionContextNotFound => "Session context not found",
        /// Mandatory IE missing
        MandatoryIeMissing => "Mandatory IE missing",
        /// Conditional IE missing
        ConditionalIeMissing => "Conditional IE missing",
        /// Invalid length
        InvalidLength => "Invalid length",
        /// Mandatory IE incorrect
        MandatoryIeIncorrect => "Mandatory IE incorrect",
        /// Invalid forwarding policy
        InvalidForwardingPolicy => "Invalid Forwarding Policy",
        /// Invalid F-TEID allocation option
        InvalidFTeidAllocationOption => "Invalid F-TEID allocation option",
        /// No established PFCP association
        NoEstablishedPfcpAssociation => "No established PFCP Association",
        /// Rule creation or modification failure
        RuleCreationModificationFailure => "Rule creation/modification Failure",
        /// PFCP entity in congestion
        PfcpEntityInCongestion => "PFCP entity in congestion",
        /// No resources available
        NoResourcesAvailable => "No resources available",
        /// Service not supported
        ServiceNotSupported => "Service not supported",
        /// System failure
        SystemFailure => "System failure",
    }
}

impl Cause {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Self::RequestAccepted => 1,
            Self::MoreUsageReportToSend => 2,
            Self::RequestRejected => 64,
            Self::SessionContextNotFound => 65,
            Self::MandatoryIeMissing => 66,
            Self::ConditionalIeMissing => 67,
            Self::InvalidLength => 68,
            Self::MandatoryIeIncorrect => 69,
            Self::InvalidForwardingPolicy => 70,
            Self::InvalidFTeidAllocationOption => 71,
            Self::NoEstablishedPfcpAssociation => 72,
            Self::RuleCreationModificationFailure => 73,
            Self::PfcpEntityInCongestion => 74,
            Self::NoResourcesAvailable => 75,
            Self::ServiceNotSupported => 76,
            Self::SystemFailure => 77,
        }
    }

    /// Reverse of [`Cause::code`]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

impl IeEncode for Cause {
    fn encode_ie(&self, buf: &mut BytesMut) -> crate::error::Result<()> {
        put_u8_ie(buf, types::CAUSE, self.code())
    }
}

impl IeEncode for PdnType {
    fn encode_ie(&self, buf: &mut BytesMut) -> crate::error::Result<()> {
        put_u8_ie(buf, types::PDN_TYPE, self.code())
    }
}

impl IeDecode for PdnType {
    fn decode_ie(value: &[u8]) -> crate::error::Result<Self> {
        let code = ValueReader::new(types::PDN_TYPE, value).u8()? & 0x07;
        Self::from_code(code).ok_or_else(|| PfcpError::InvalidIeValue {
            ie_type: types::PDN_TYPE,
            reason: format!("unknown PDN type {code}"),
        })
    }
}
