//! Link-layer parsing for the enceladus capture agent
//!
//! - [`ethernet`] - Ethernet II / 802.3 header parsing and EtherType names
//! - [`record`] - direction classification and the per-frame [`LinkLayerRecord`]

pub mod ethernet;
pub mod record;

pub use ethernet::{EtherType, EthernetHeader, HeaderError};
pub use record::{Direction, LinkLayerRecord};
