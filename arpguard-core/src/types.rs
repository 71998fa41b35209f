//! Common types used throughout arpguard

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Length of an Ethernet hardware address
    pub const LEN: usize = 6;

    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff, 0xff, 0xff, 0xff, 0xff, 0xff])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
    }

    /// Create a MAC address from a slice of exactly six bytes
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(slice).ok().map(Self)
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Check if this is the all-zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
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
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(crate::Error::invalid_parameter(
                "mac",
                "expected six colon-separated octets",
            ));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(crate::Error::invalid_parameter("mac", "octet must be two hex digits"));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| crate::Error::invalid_parameter("mac", "invalid hex octet"))?;
        }

        Ok(MacAddr(bytes))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

/// Ethertype constants
pub mod ethertypes {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const RARP: u16 = 0x8035;
    pub const DOT1Q: u16 = 0x8100;
    pub const QINQ: u16 = 0x88A8;
    pub const IPV6: u16 = 0x86DD;
}

/// ARP header field constants
pub mod arp_constants {
    /// Hardware type for Ethernet
    pub const HTYPE_ETHERNET: u16 = 1;
    /// Protocol type for IPv4
    pub const PTYPE_IPV4: u16 = 0x0800;
    /// htype + ptype + hlen + plen + oper
    pub const FIXED_HEADER_LEN: usize = 8;
    /// Full Ethernet/IPv4 ARP message
    pub const ETHERNET_IPV4_LEN: usize = 28;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_is_lowercase() {
        let mac = MacAddr::new([0xAA, 0xBB, 0x0C, 0x01, 0xEE, 0xFF]);
        assert_eq!(mac.to_string(), "aa:bb:0c:01:ee:ff");
    }

    #[test]
    fn test_mac_parse() {
        let mac: MacAddr = "AA:bb:cc:00:11:22".parse().unwrap();
        assert_eq!(mac, MacAddr([0xaa, 0xbb, 0xcc, 0x00, 0x11, 0x22]));

        assert!("aa:bb:cc".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc:dd:ee:gg".parse::<MacAddr>().is_err());
        assert!("aaa:bb:cc:dd:ee:ff".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_mac_from_slice() {
        assert_eq!(
            MacAddr::from_slice(&[1, 2, 3, 4, 5, 6]),
            Some(MacAddr([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(MacAddr::from_slice(&[1, 2, 3]), None);
        assert!(MacAddr::zero().is_zero());
        assert!(!MacAddr::broadcast().is_zero());
    }
}
