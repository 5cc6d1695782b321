// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Interface-name to handle resolution via `pnet` datalink enumeration.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{McastError, Result};

/// Linux interface flags (from if.h)
pub mod interface_flags {
    pub const IFF_UP: u32 = 0x1;
    pub const IFF_LOOPBACK: u32 = 0x8;
    pub const IFF_POINTOPOINT: u32 = 0x10;
    pub const IFF_RUNNING: u32 = 0x40;
    pub const IFF_MULTICAST: u32 = 0x1000;
}

/// A resolved network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceHandle {
    pub name: String,
    pub index: u32,
    /// First IPv4 address configured on the interface
    pub ipv4: Option<Ipv4Addr>,
    pub flags: u32,
}

impl InterfaceHandle {
    pub fn is_up(&self) -> bool {
        self.flags & interface_flags::IFF_UP != 0
    }

    pub fn is_loopback(&self) -> bool {
        self.flags & interface_flags::IFF_LOOPBACK != 0
    }

    pub fn is_multicast_capable(&self) -> bool {
        self.is_up() && self.flags & interface_flags::IFF_MULTICAST != 0
    }

    /// Get a human-readable reason why multicast is not supported
    pub fn multicast_unsupported_reason(&self) -> Option<String> {
        if !self.is_up() {
            Some("interface is down".to_string())
        } else if self.flags & interface_flags::IFF_MULTICAST == 0 {
            if self.flags & interface_flags::IFF_POINTOPOINT != 0 {
                Some("point-to-point interface without multicast support".to_string())
            } else {
                Some("interface lacks IFF_MULTICAST flag".to_string())
            }
        } else {
            None
        }
    }

    /// IPv4 address of the interface, required for raw sends from it
    pub fn require_ipv4(&self) -> Result<Ipv4Addr> {
        self.ipv4
            .ok_or_else(|| McastError::unresolved(&self.name, "interface has no IPv4 address"))
    }
}

impl fmt::Display for InterfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.is_up() {
            flags.push("UP");
        }
        if self.flags & interface_flags::IFF_RUNNING != 0 {
            flags.push("RUNNING");
        }
        if self.flags & interface_flags::IFF_MULTICAST != 0 {
            flags.push("MULTICAST");
        }
        if self.is_loopback() {
            flags.push("LOOPBACK");
        }
        write!(f, "{}: <{}>", self.name, flags.join(","))?;
        if let Some(ip) = self.ipv4 {
            write!(f, " {}", ip)?;
        }
        Ok(())
    }
}

impl From<pnet::datalink::NetworkInterface> for InterfaceHandle {
    fn from(iface: pnet::datalink::NetworkInterface) -> Self {
        let ipv4 = iface.ips.iter().find_map(|network| match network.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        });
        Self {
            name: iface.name,
            index: iface.index,
            ipv4,
            flags: iface.flags,
        }
    }
}

/// Resolve an interface by name.
///
/// A missing interface is an `AddressResolution` failure.
pub fn lookup(name: &str) -> Result<InterfaceHandle> {
    pnet::datalink::interfaces()
        .into_iter()
        .find(|iface| iface.name == name)
        .map(InterfaceHandle::from)
        .ok_or_else(|| {
            let candidates: Vec<String> = multicast_capable_interfaces()
                .into_iter()
                .map(|iface| iface.name)
                .collect();
            McastError::unresolved(
                name,
                &format!(
                    "no such interface (multicast-capable: {})",
                    if candidates.is_empty() {
                        "none".to_string()
                    } else {
                        candidates.join(", ")
                    }
                ),
            )
        })
}

/// Resolve an optional interface hint
pub fn lookup_hint(hint: Option<&str>) -> Result<Option<InterfaceHandle>> {
    hint.map(lookup).transpose()
}

/// Get all multicast-capable interfaces
pub fn multicast_capable_interfaces() -> Vec<InterfaceHandle> {
    pnet::datalink::interfaces()
        .into_iter()
        .map(InterfaceHandle::from)
        .filter(InterfaceHandle::is_multicast_capable)
        .collect()
}
