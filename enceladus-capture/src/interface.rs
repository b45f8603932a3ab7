//! Capture device enumeration

use enceladus_core::{hardware_addresses, Error, MacAddr, Result};
use pcap::Device;
use std::fmt;
use std::net::IpAddr;

/// A device libpcap can capture on
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name (e.g., "eth0", "any")
    pub name: String,
    /// Human-readable description
    pub description: Option<String>,
    /// Addresses assigned to the device
    pub addresses: Vec<IpAddr>,
    /// Hardware address from the OS interface table
    pub mac: Option<MacAddr>,
    pub is_loopback: bool,
    pub is_up: bool,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(mac) = &self.mac {
            write!(f, " [{}]", mac)?;
        }
        if self.is_loopback {
            write!(f, " (loopback)")?;
        }
        if !self.is_up {
            write!(f, " (down)")?;
        }
        if let Some(description) = &self.description {
            write!(f, " - {}", description)?;
        }
        if !self.addresses.is_empty() {
            let addresses: Vec<String> = self.addresses.iter().map(|a| a.to_string()).collect();
            write!(f, " {}", addresses.join(", "))?;
        }
        Ok(())
    }
}

/// List every device libpcap can open
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let devices = Device::list().map_err(|e| Error::capture(format!("Failed to list devices: {}", e)))?;
    let macs = hardware_addresses();

    Ok(devices
        .into_iter()
        .map(|device| {
            let mac = macs
                .iter()
                .find(|(name, mac)| *name == device.name && !mac.is_zero())
                .map(|(_, mac)| *mac);
            DeviceInfo {
                addresses: device.addresses.iter().map(|a| a.addr).collect(),
                is_loopback: device.flags.is_loopback(),
                is_up: device.flags.is_up(),
                description: device.desc,
                name: device.name,
                mac,
            }
        })
        .collect())
}
