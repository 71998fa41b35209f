//! Network interface enumeration

use arpguard_core::{Error, MacAddr, Result};
use pnet_datalink::{self, NetworkInterface};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Information about a network interface
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description (often empty outside Windows)
    pub description: String,
    /// Interface index
    pub index: u32,
    /// MAC address if available
    pub mac: Option<MacAddr>,
    /// Addresses assigned to this interface
    pub ips: Vec<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        InterfaceInfo {
            name: iface.name.clone(),
            description: iface.description.clone(),
            index: iface.index,
            mac: iface
                .mac
                .map(|mac| MacAddr::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5])),
            ips: iface.ips.iter().map(|network| network.ip()).collect(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

impl InterfaceInfo {
    /// Up, not loopback, and carrying an Ethernet address
    pub fn is_capture_capable(&self) -> bool {
        self.is_up && !self.is_loopback && self.mac.map_or(false, |mac| !mac.is_zero())
    }

    /// Get the primary IPv4 address if available
    pub fn primary_ipv4(&self) -> Option<Ipv4Addr> {
        self.ips.iter().find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        })
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12}", self.name)?;
        match self.mac {
            Some(mac) => write!(f, " {}", mac)?,
            None => write!(f, " {:<17}", "-")?,
        }
        match self.primary_ipv4() {
            Some(ip) => write!(f, " {:<15}", ip)?,
            None => write!(f, " {:<15}", "-")?,
        }
        let state = if self.is_up { "up" } else { "down" };
        write!(f, " {}", state)?;
        if self.is_loopback {
            write!(f, " loopback")?;
        }
        Ok(())
    }
}

/// List all available network interfaces
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>> {
    let interfaces = pnet_datalink::interfaces();

    if interfaces.is_empty() {
        return Err(Error::Interface(
            "No network interfaces found. Are you running with sufficient privileges?".to_string(),
        ));
    }

    Ok(interfaces.iter().map(InterfaceInfo::from).collect())
}

/// Get information about a specific interface by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .find(|iface| iface.name == name)
        .map(InterfaceInfo::from)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

/// First capture-capable interface
pub fn default_interface() -> Result<InterfaceInfo> {
    list_interfaces()?
        .into_iter()
        .find(|iface| iface.is_capture_capable())
        .ok_or_else(|| Error::Interface("No suitable default interface found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(is_up: bool, is_loopback: bool, mac: Option<MacAddr>) -> InterfaceInfo {
        InterfaceInfo {
            name: "eth0".to_string(),
            description: String::new(),
            index: 2,
            mac,
            ips: vec![
                "fe80::1".parse().unwrap(),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            ],
            is_up,
            is_loopback,
        }
    }

    #[test]
    fn test_get_nonexistent_interface() {
        match get_interface("nonexistent_interface_xyz") {
            Err(Error::InterfaceNotFound(name)) => assert_eq!(name, "nonexistent_interface_xyz"),
            other => panic!("Expected InterfaceNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_capture_capable() {
        let mac = Some(MacAddr::new([0x02, 0, 0, 0, 0, 1]));
        assert!(info(true, false, mac).is_capture_capable());
        assert!(!info(false, false, mac).is_capture_capable());
        assert!(!info(true, true, mac).is_capture_capable());
        assert!(!info(true, false, None).is_capture_capable());
        assert!(!info(true, false, Some(MacAddr::zero())).is_capture_capable());
    }

    #[test]
    fn test_primary_ipv4_skips_v6() {
        let iface = info(true, false, None);
        assert_eq!(iface.primary_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn test_display() {
        let iface = info(true, false, Some(MacAddr::new([0x02, 0, 0, 0, 0, 1])));
        let line = iface.to_string();
        assert!(line.starts_with("eth0"));
        assert!(line.contains("02:00:00:00:00:01"));
        assert!(line.contains("192.168.1.10"));
        assert!(line.ends_with("up"));
    }

    #[test]
    fn test_listed_interfaces_have_names() {
        // Interface availability depends on the host; only check shape
        if let Ok(interfaces) = list_interfaces() {
            for iface in interfaces {
                assert!(!iface.name.is_empty());
                if iface.is_loopback {
                    assert!(!iface.is_capture_capable());
                }
            }
        }
    }
}
