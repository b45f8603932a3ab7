//! Ethernet II / IEEE 802.3 header parsing

use enceladus_core::MacAddr;
use std::fmt;

/// Type carried by an Ethernet frame.
///
/// Frames whose type/length field holds a payload length (IEEE 802.3) are
/// [`EtherType::LLC`]; values without a name are kept as
/// [`EtherType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EtherType {
    IPv4,
    ARP,
    /// Reverse ARP
    RARP,
    /// 802.1Q tag
    VLAN,
    IPv6,
    MPLS,
    MPLSMulticast,
    PPPoEDiscovery,
    PPPoESession,
    /// 802.1X port authentication
    Dot1X,
    /// 802.1ad outer tag
    QinQ,
    /// LACP and other slow protocols
    SlowProtocols,
    LLDP,
    /// Precision Time Protocol
    PTP,
    /// IEEE 802.3 length frame
    LLC,
    Other(u16),
}

/// Named types with their field value and tag name
const NAMED: [(EtherType, u16, &str); 14] = [
    (EtherType::IPv4, 0x0800, "IPv4"),
    (EtherType::ARP, 0x0806, "ARP"),
    (EtherType::RARP, 0x8035, "RARP"),
    (EtherType::VLAN, 0x8100, "VLAN"),
    (EtherType::IPv6, 0x86DD, "IPv6"),
    (EtherType::SlowProtocols, 0x8809, "SlowProtocols"),
    (EtherType::MPLS, 0x8847, "MPLS"),
    (EtherType::MPLSMulticast, 0x8848, "MPLS-Multicast"),
    (EtherType::PPPoEDiscovery, 0x8863, "PPPoE-Discovery"),
    (EtherType::PPPoESession, 0x8864, "PPPoE-Session"),
    (EtherType::Dot1X, 0x888E, "802.1X"),
    (EtherType::QinQ, 0x88A8, "802.1ad"),
    (EtherType::LLDP, 0x88CC, "LLDP"),
    (EtherType::PTP, 0x88F7, "PTP"),
];

impl EtherType {
    /// Largest type/length value that is a payload length
    pub const MAX_LENGTH_VALUE: u16 = 1500;

    /// Interpret the type/length field of a frame header
    pub fn from_type_or_length(value: u16) -> Self {
        if value <= Self::MAX_LENGTH_VALUE {
            return EtherType::LLC;
        }
        NAMED
            .iter()
            .find(|(_, code, _)| *code == value)
            .map(|(ethertype, _, _)| *ethertype)
            .unwrap_or(EtherType::Other(value))
    }

    /// Field value of this type; `None` for [`EtherType::LLC`], whose field
    /// is a length
    pub fn code(self) -> Option<u16> {
        match self {
            EtherType::LLC => None,
            EtherType::Other(code) => Some(code),
            named => NAMED
                .iter()
                .find(|(ethertype, _, _)| *ethertype == named)
                .map(|(_, code, _)| *code),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::LLC => f.write_str("LLC"),
            EtherType::Other(code) => write!(f, "0x{:04X}", code),
            named => {
                let name = NAMED
                    .iter()
                    .find(|(ethertype, _, _)| ethertype == named)
                    .map_or("unknown", |(_, _, name)| *name);
                f.write_str(name)
            }
        }
    }
}

/// Why a link-layer header could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// Fewer bytes captured than the fixed header needs
    Truncated { captured: usize },
    /// The capture does not carry Ethernet headers at all
    UnsupportedLinkType,
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::Truncated { captured } => write!(
                f,
                "header truncated: {} of {} bytes captured",
                captured,
                EthernetHeader::SIZE
            ),
            HeaderError::UnsupportedLinkType => write!(f, "capture link type is not Ethernet"),
        }
    }
}

/// Fixed part of an Ethernet II / 802.3 frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Ethernet header size (dst + src + type/length)
    pub const SIZE: usize = 14;

    /// Parse the header at the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < Self::SIZE {
            return Err(HeaderError::Truncated {
                captured: data.len(),
            });
        }

        let truncated = || HeaderError::Truncated {
            captured: data.len(),
        };
        let destination = MacAddr::from_slice(&data[0..6]).ok_or_else(truncated)?;
        let source = MacAddr::from_slice(&data[6..12]).ok_or_else(truncated)?;
        let type_or_length = u16::from_be_bytes([data[12], data[13]]);

        Ok(EthernetHeader {
            destination,
            source,
            ethertype: EtherType::from_type_or_length(type_or_length),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes() {
        assert_eq!(EtherType::from_type_or_length(0x0800), EtherType::IPv4);
        assert_eq!(EtherType::from_type_or_length(0x88CC), EtherType::LLDP);
        assert_eq!(EtherType::from_type_or_length(0x1234), EtherType::Other(0x1234));
        assert_eq!(EtherType::ARP.code(), Some(0x0806));
        assert_eq!(EtherType::Other(0x9000).code(), Some(0x9000));
        assert_eq!(EtherType::LLC.code(), None);
    }

    #[test]
    fn test_every_named_type_round_trips() {
        for (ethertype, code, _) in NAMED {
            assert_eq!(EtherType::from_type_or_length(code), ethertype);
            assert_eq!(ethertype.code(), Some(code));
        }
    }

    #[test]
    fn test_ethertype_display() {
        assert_eq!(EtherType::IPv6.to_string(), "IPv6");
        assert_eq!(EtherType::QinQ.to_string(), "802.1ad");
        assert_eq!(EtherType::LLC.to_string(), "LLC");
        assert_eq!(EtherType::Other(0x9000).to_string(), "0x9000");
    }

    #[test]
    fn test_length_field_is_llc() {
        assert_eq!(EtherType::from_type_or_length(46), EtherType::LLC);
        assert_eq!(EtherType::from_type_or_length(1500), EtherType::LLC);
        assert_eq!(EtherType::from_type_or_length(1501), EtherType::Other(1501));
    }

    #[test]
    fn test_parse_header() {
        let data = [
            0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0x86, 0xDD, // IPv6
            0x60, 0x00, // payload
        ];

        let header = EthernetHeader::parse(&data).unwrap();
        assert_eq!(header.destination.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(header.source.as_bytes(), &[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(header.ethertype, EtherType::IPv6);
    }

    #[test]
    fn test_parse_header_only() {
        let mut data = [0u8; EthernetHeader::SIZE];
        data[12] = 0x00;
        data[13] = 0x26;
        assert_eq!(EthernetHeader::parse(&data).unwrap().ethertype, EtherType::LLC);
    }

    #[test]
    fn test_parse_truncated() {
        let data = [0xFFu8; 13];
        assert_eq!(
            EthernetHeader::parse(&data),
            Err(HeaderError::Truncated { captured: 13 })
        );
        assert_eq!(
            EthernetHeader::parse(&[]),
            Err(HeaderError::Truncated { captured: 0 })
        );
    }
}
