//! Packet capture for arpguard
//!
//! A thin, typed layer over pcap that delivers ARP frames to the detector:
//!
//! - **Interfaces**: enumerate and pick the interface to listen on
//! - **Live capture**: promiscuous, immediate-mode capture on a background
//!   thread, restricted to ARP by a BPF filter, Ethernet datalinks only
//! - **Replay**: feed a pcap savefile through the same path
//! - **Statistics**: frame, byte and drop counters shared across threads
//!
//! ## Example
//!
//! ```no_run
//! use arpguard_capture::{default_interface, PacketCapture};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let iface = default_interface()?;
//! let mut capture = PacketCapture::new(&iface.name)?;
//!
//! capture.start(|packet| {
//!     println!("ARP frame: {} bytes", packet.len());
//! })?;
//!
//! capture.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod filters;
pub mod interface;
pub mod stats;

pub use capture::{replay_savefile, CaptureConfig, CaptureState, PacketCapture};
pub use interface::{default_interface, get_interface, list_interfaces, InterfaceInfo};
pub use stats::{CaptureStats, StatsAccumulator};
