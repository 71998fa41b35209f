//! Ethernet frame construction and parsing
//!
//! Parsing borrows from the captured buffer so the ARP payload can be handed
//! to the decoder without copying. Construction is kept for fixtures and
//! savefile tooling.

use arpguard_core::{ethertypes, Error, MacAddr, Result};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// EtherType values arpguard distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    Arp,
    /// RARP (0x8035)
    Rarp,
    /// 802.1Q VLAN tag (0x8100)
    Vlan,
    /// 802.1ad service tag (0x88A8)
    QinQ,
    /// IPv6 (0x86DD)
    IPv6,
    /// 802.3 length field (values up to 1500)
    Length(u16),
    /// Anything else
    Custom(u16),
}

impl EtherType {
    /// Convert EtherType to u16 value
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => ethertypes::IPV4,
            EtherType::Arp => ethertypes::ARP,
            EtherType::Rarp => ethertypes::RARP,
            EtherType::Vlan => ethertypes::DOT1Q,
            EtherType::QinQ => ethertypes::QINQ,
            EtherType::IPv6 => ethertypes::IPV6,
            EtherType::Length(len) => len,
            EtherType::Custom(val) => val,
        }
    }

    /// Create EtherType from u16 value
    pub fn from_u16(value: u16) -> Self {
        match value {
            ethertypes::IPV4 => EtherType::IPv4,
            ethertypes::ARP => EtherType::Arp,
            ethertypes::RARP => EtherType::Rarp,
            ethertypes::DOT1Q => EtherType::Vlan,
            ethertypes::QINQ => EtherType::QinQ,
            ethertypes::IPV6 => EtherType::IPv6,
            len if len <= 1500 => EtherType::Length(len),
            val => EtherType::Custom(val),
        }
    }

    /// Whether this EtherType introduces a VLAN tag
    pub fn is_vlan_tag(self) -> bool {
        matches!(self, EtherType::Vlan | EtherType::QinQ)
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::Rarp => write!(f, "RARP"),
            EtherType::Vlan => write!(f, "802.1Q"),
            EtherType::QinQ => write!(f, "802.1ad"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Length(len) => write!(f, "802.3 length {}", len),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// A VLAN tag found between the MAC addresses and the inner EtherType
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    /// Tag protocol identifier (0x8100 or 0x88A8)
    pub tpid: u16,
    /// Priority code point
    pub pcp: u8,
    /// VLAN identifier (12 bits)
    pub vid: u16,
}

impl VlanTag {
    /// Size of one tag (TCI + inner EtherType)
    pub const SIZE: usize = 4;

    fn from_tci(tpid: u16, tci: u16) -> Self {
        Self {
            tpid,
            pcp: (tci >> 13) as u8,
            vid: tci & 0x0FFF,
        }
    }
}

/// Parsed Ethernet II header, VLAN tags resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// VLAN tags, outermost first
    pub vlans: Vec<VlanTag>,
    /// EtherType of the payload after all tags
    pub ethertype: EtherType,
}

impl EthernetHeader {
    /// Untagged header size (dst + src + type)
    pub const SIZE: usize = 14;

    /// Tags deeper than this are rejected
    pub const MAX_VLAN_TAGS: usize = 2;

    /// Parse the header and return it with the payload that follows it
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return Err(Error::parsing(format!(
                "Ethernet frame too short: {} bytes",
                data.len()
            )));
        }

        let destination = MacAddr::from_slice(&data[0..6])
            .ok_or_else(|| Error::parsing("bad destination MAC"))?;
        let source =
            MacAddr::from_slice(&data[6..12]).ok_or_else(|| Error::parsing("bad source MAC"))?;

        let mut ethertype = EtherType::from_u16(u16::from_be_bytes([data[12], data[13]]));
        let mut offset = Self::SIZE;
        let mut vlans = Vec::new();

        while ethertype.is_vlan_tag() {
            if vlans.len() == Self::MAX_VLAN_TAGS {
                return Err(Error::parsing("too many VLAN tags"));
            }
            if data.len() < offset + VlanTag::SIZE {
                return Err(Error::parsing("truncated VLAN tag"));
            }

            let tci = u16::from_be_bytes([data[offset], data[offset + 1]]);
            vlans.push(VlanTag::from_tci(ethertype.to_u16(), tci));
            ethertype =
                EtherType::from_u16(u16::from_be_bytes([data[offset + 2], data[offset + 3]]));
            offset += VlanTag::SIZE;
        }

        Ok((
            Self {
                destination,
                source,
                vlans,
                ethertype,
            },
            &data[offset..],
        ))
    }

    /// Length of the link-layer header including tags
    pub fn header_len(&self) -> usize {
        Self::SIZE + self.vlans.len() * VlanTag::SIZE
    }
}

/// Locate the ARP payload inside a captured Ethernet frame.
///
/// Returns `None` for frames that are too short, malformed, or carry
/// anything other than ARP.
pub fn arp_payload(frame: &[u8]) -> Option<&[u8]> {
    match EthernetHeader::parse(frame) {
        Ok((header, payload)) if header.ethertype == EtherType::Arp => Some(payload),
        _ => None,
    }
}

/// Ethernet II frame, for building test and replay traffic
#[derive(Debug, Clone)]
pub struct EthernetFrame {
    /// Destination MAC address
    pub destination: MacAddr,
    /// Source MAC address
    pub source: MacAddr,
    /// Optional 802.1Q VLAN id
    pub vlan: Option<u16>,
    /// EtherType of the payload
    pub ethertype: EtherType,
    /// Payload data
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Minimum Ethernet frame size (without FCS)
    pub const MIN_FRAME_SIZE: usize = 60;

    /// Create a new untagged frame
    pub fn new(
        destination: MacAddr,
        source: MacAddr,
        ethertype: EtherType,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            destination,
            source,
            vlan: None,
            ethertype,
            payload,
        }
    }

    /// Tag the frame with an 802.1Q VLAN id
    pub fn with_vlan(mut self, vid: u16) -> Self {
        self.vlan = Some(vid & 0x0FFF);
        self
    }

    /// Convert the frame to bytes, padded to the minimum frame size
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(Self::MIN_FRAME_SIZE + self.payload.len());

        buffer.put_slice(self.destination.as_bytes());
        buffer.put_slice(self.source.as_bytes());

        if let Some(vid) = self.vlan {
            buffer.put_u16(ethertypes::DOT1Q);
            buffer.put_u16(vid);
        }

        buffer.put_u16(self.ethertype.to_u16());
        buffer.put_slice(&self.payload);

        let mut result = buffer.to_vec();
        if result.len() < Self::MIN_FRAME_SIZE {
            result.resize(Self::MIN_FRAME_SIZE, 0);
        }

        result
    }
}
