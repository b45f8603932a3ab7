//! Local hardware-address lookup

use crate::{Error, MacAddr, Result};
use tracing::debug;

/// Hardware address of the interface named `alias`.
///
/// Fails with [`Error::InterfaceNotFound`] when the OS has no such
/// interface and [`Error::NoHardwareAddress`] when it has no address or
/// reports the all-zero one.
pub fn require_hardware_address(alias: &str) -> Result<MacAddr> {
    let interfaces = pnet_datalink::interfaces();
    let Some(iface) = interfaces.into_iter().find(|i| i.name == alias) else {
        debug!(alias = %alias, "Interface not present in OS interface table");
        return Err(Error::InterfaceNotFound(alias.to_string()));
    };

    let mac = iface
        .mac
        .map(|mac| MacAddr::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
        .filter(|mac| !mac.is_zero())
        .ok_or_else(|| Error::NoHardwareAddress(alias.to_string()))?;

    debug!(alias = %alias, index = iface.index, mac = %mac, "Resolved interface");
    Ok(mac)
}

/// Like [`require_hardware_address`], but a missing interface or address
/// yields `Ok(None)`.
pub fn resolve_hardware_address(alias: &str) -> Result<Option<MacAddr>> {
    match require_hardware_address(alias) {
        Ok(mac) => Ok(Some(mac)),
        Err(Error::InterfaceNotFound(_)) | Err(Error::NoHardwareAddress(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Hardware address for every OS interface that has one, keyed by name
pub fn hardware_addresses() -> Vec<(String, MacAddr)> {
    pnet_datalink::interfaces()
        .into_iter()
        .filter_map(|iface| {
            let mac = iface.mac?;
            Some((
                iface.name,
                MacAddr::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]),
            ))
        })
        .collect()
}
