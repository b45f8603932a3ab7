//! Common types used throughout the enceladus agent

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from the first six bytes of `slice`
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.get(..6)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| crate::Error::InvalidValue {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(invalid("expected six octets"));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return Err(invalid("octet must be one or two hex digits"));
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| invalid("invalid hex octet"))?;
        }

        Ok(MacAddr(bytes))
    }
}

/// Datalink type reported by a capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// IEEE 802.3 Ethernet (DLT_EN10MB)
    Ethernet,
    /// Anything else, with the raw DLT value
    Other(i32),
}

impl LinkType {
    /// DLT_EN10MB
    pub const DLT_EN10MB: i32 = 1;

    pub fn from_dlt(dlt: i32) -> Self {
        if dlt == Self::DLT_EN10MB {
            LinkType::Ethernet
        } else {
            LinkType::Other(dlt)
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Ethernet => write!(f, "EN10MB"),
            LinkType::Other(dlt) => write!(f, "DLT {}", dlt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_is_lower_case() {
        let mac = MacAddr::new([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0xEF]);
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:ef");
    }

    #[test]
    fn test_mac_parse() {
        let mac: MacAddr = "00:1a:2b:3c:4d:ef".parse().unwrap();
        assert_eq!(mac.as_bytes(), &[0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0xEF]);

        let dashed: MacAddr = "00-1A-2B-3C-4D-EF".parse().unwrap();
        assert_eq!(mac, dashed);

        assert!("00:1a:2b:3c:4d".parse::<MacAddr>().is_err());
        assert!("00:1a:2b:3c:4d:zz".parse::<MacAddr>().is_err());
        assert!("00:1a:2b:3c:4d:123".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_mac_from_slice() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        assert_eq!(MacAddr::from_slice(&data), Some(MacAddr::new([1, 2, 3, 4, 5, 6])));
        assert_eq!(MacAddr::from_slice(&data[..5]), None);
    }

    #[test]
    fn test_link_type_from_dlt() {
        assert_eq!(LinkType::from_dlt(1), LinkType::Ethernet);
        assert_eq!(LinkType::from_dlt(113), LinkType::Other(113));
    }
}
