//! ARP message decoding
//!
//! The decoder is deliberately permissive: it checks length and converts the
//! opcode from network byte order, nothing more. Hardware and protocol type
//! fields are carried through for diagnostics but never validated.

use arpguard_core::arp_constants::{
    ETHERNET_IPV4_LEN, FIXED_HEADER_LEN, HTYPE_ETHERNET, PTYPE_IPV4,
};
use arpguard_core::{Error, MacAddr, Result};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::net::Ipv4Addr;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArpOpcode {
    /// who-has target? tell sender
    Request,
    /// sender is-at sender hardware address
    Reply,
    /// RARP, InARP and anything newer
    Other(u16),
}

impl ArpOpcode {
    pub fn from_u16(val: u16) -> Self {
        match val {
            1 => Self::Request,
            2 => Self::Reply,
            other => Self::Other(other),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ArpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Reply => write!(f, "reply"),
            Self::Other(op) => write!(f, "opcode {}", op),
        }
    }
}

/// How address field widths are determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressLayout {
    /// 6-byte hardware and 4-byte protocol addresses regardless of the
    /// hlen/plen header bytes
    #[default]
    Fixed,
    /// Field widths come from hlen/plen; anything other than 6/4 is
    /// rejected with `UnsupportedAddressLength`
    FromHeader,
}

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderConfig {
    pub layout: AddressLayout,
}

/// A decoded ARP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpMessage {
    /// Hardware type (1 for Ethernet), not validated
    pub htype: u16,
    /// Protocol type (0x0800 for IPv4), not validated
    pub ptype: u16,
    /// Hardware address length as advertised
    pub hlen: u8,
    /// Protocol address length as advertised
    pub plen: u8,
    /// Operation
    pub opcode: ArpOpcode,
    /// Sender hardware address
    pub sender_mac: MacAddr,
    /// Sender protocol address
    pub sender_ip: Ipv4Addr,
    /// Target hardware address
    pub target_mac: MacAddr,
    /// Target protocol address
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    /// Length of an Ethernet/IPv4 ARP message
    pub const LEN: usize = ETHERNET_IPV4_LEN;

    /// Decode with the default fixed 6/4 layout
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::decode_with(data, &DecoderConfig::default())
    }

    /// Decode according to `config`
    pub fn decode_with(data: &[u8], config: &DecoderConfig) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(Error::MalformedMessage {
                len: data.len(),
                required: Self::LEN,
            });
        }

        let hlen = data[4];
        let plen = data[5];

        let required = match config.layout {
            AddressLayout::Fixed => Self::LEN,
            AddressLayout::FromHeader => {
                FIXED_HEADER_LEN + 2 * (usize::from(hlen) + usize::from(plen))
            }
        };

        if data.len() < required {
            return Err(Error::MalformedMessage {
                len: data.len(),
                required,
            });
        }

        if config.layout == AddressLayout::FromHeader
            && (usize::from(hlen) != MacAddr::LEN || plen != 4)
        {
            return Err(Error::UnsupportedAddressLength { hlen, plen });
        }

        // From here on both layouts agree on 6/4 offsets.
        let sender_mac = read_mac(&data[8..14]);
        let sender_ip = Ipv4Addr::new(data[14], data[15], data[16], data[17]);
        let target_mac = read_mac(&data[18..24]);
        let target_ip = Ipv4Addr::new(data[24], data[25], data[26], data[27]);

        Ok(Self {
            htype: u16::from_be_bytes([data[0], data[1]]),
            ptype: u16::from_be_bytes([data[2], data[3]]),
            hlen,
            plen,
            opcode: ArpOpcode::from_u16(u16::from_be_bytes([data[6], data[7]])),
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        })
    }

    /// who-has `target_ip`? tell `sender_ip`
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self::ethernet_ipv4(
            ArpOpcode::Request,
            sender_mac,
            sender_ip,
            MacAddr::zero(),
            target_ip,
        )
    }

    /// `sender_ip` is-at `sender_mac`, addressed to the target pair
    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self::ethernet_ipv4(ArpOpcode::Reply, sender_mac, sender_ip, target_mac, target_ip)
    }

    /// Announcement of the sender's own binding
    pub fn gratuitous(mac: MacAddr, ip: Ipv4Addr) -> Self {
        Self::ethernet_ipv4(ArpOpcode::Request, mac, ip, MacAddr::zero(), ip)
    }

    fn ethernet_ipv4(
        opcode: ArpOpcode,
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: 6,
            plen: 4,
            opcode,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Serialize to the 28-byte Ethernet/IPv4 wire form
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::LEN);

        buf.put_u16(self.htype);
        buf.put_u16(self.ptype);
        buf.put_u8(self.hlen);
        buf.put_u8(self.plen);
        buf.put_u16(self.opcode.to_u16());
        buf.put_slice(self.sender_mac.as_bytes());
        buf.put_slice(&self.sender_ip.octets());
        buf.put_slice(self.target_mac.as_bytes());
        buf.put_slice(&self.target_ip.octets());

        buf.to_vec()
    }

    /// Sender announces its own address (sender and target IP equal)
    pub fn is_gratuitous(&self) -> bool {
        self.sender_ip == self.target_ip
    }
}

fn read_mac(bytes: &[u8]) -> MacAddr {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(bytes);
    MacAddr(mac)
}
