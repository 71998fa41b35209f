//! Link-layer helpers for arpguard
//!
//! Captured frames arrive with their Ethernet header attached. This crate
//! parses that header, steps over 802.1Q / 802.1ad tags and hands back the
//! ARP payload so the detector never has to know about framing:
//!
//! ```rust
//! use arpguard_packet::ethernet::{arp_payload, EtherType, EthernetFrame};
//! use arpguard_core::MacAddr;
//!
//! let frame = EthernetFrame::new(
//!     MacAddr::broadcast(),
//!     MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
//!     EtherType::Arp,
//!     vec![0u8; 28],
//! )
//! .to_bytes();
//!
//! assert_eq!(arp_payload(&frame).map(|p| p.len()), Some(46));
//! ```
//!
//! The returned payload includes any trailing Ethernet padding; the ARP
//! decoder only reads the header-defined prefix.

pub mod ethernet;

pub use ethernet::{arp_payload, EtherType, EthernetFrame, EthernetHeader, VlanTag};
