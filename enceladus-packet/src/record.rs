//! Link-layer records derived from captured frames

use crate::ethernet::{EtherType, EthernetHeader, HeaderError};
use enceladus_core::{Frame, LinkType, MacAddr};
use std::fmt;
use std::time::SystemTime;

/// Direction of a frame relative to the local capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Addressed to the local device
    In,
    /// Sent by the local device
    Out,
    /// Neither sent by nor addressed to the local device
    Unclassified,
}

impl Direction {
    /// Classify a frame by its addresses.
    ///
    /// The source is checked first, so a frame the device sends to itself
    /// is `Out`.
    pub fn classify(local: MacAddr, source: MacAddr, destination: MacAddr) -> Self {
        if source == local {
            Direction::Out
        } else if destination == local {
            Direction::In
        } else {
            Direction::Unclassified
        }
    }

    /// Tag value used in metric points
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link-layer view of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkLayerRecord {
    pub source: MacAddr,
    pub destination: MacAddr,
    pub ethertype: EtherType,
    pub direction: Direction,
    /// Length on the wire
    pub length: usize,
    pub captured_at: SystemTime,
}

impl LinkLayerRecord {
    /// Derive a record from `frame` as seen by the device owning `local`
    pub fn from_frame(frame: &Frame, link: LinkType, local: MacAddr) -> Result<Self, HeaderError> {
        if link != LinkType::Ethernet {
            return Err(HeaderError::UnsupportedLinkType);
        }

        let header = EthernetHeader::parse(frame.data())?;
        Ok(LinkLayerRecord {
            source: header.source,
            destination: header.destination,
            ethertype: header.ethertype,
            direction: Direction::classify(local, header.source, header.destination),
            length: frame.len(),
            captured_at: frame.timestamp,
        })
    }
}
