//! ARP spoofing detection
//!
//! This crate holds the detection core:
//! - decoding of ARP payloads ([`decoder`])
//! - the binding table mapping IPv4 addresses to hardware addresses
//!   ([`table`], and the sharded [`shared`] variant for multiple workers)
//! - the engine that classifies each sender pair and emits events
//!   ([`engine`], [`event`])
//!
//! ```rust
//! use arpguard_detect::{ArpMessage, DetectionEngine, DetectionEvent, DetectorConfig};
//! use arpguard_core::MacAddr;
//! use std::net::Ipv4Addr;
//!
//! let mut engine = DetectionEngine::new(DetectorConfig::default());
//! let gateway = Ipv4Addr::new(192, 168, 1, 1);
//!
//! let real = ArpMessage::gratuitous(MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]), gateway);
//! let forged = ArpMessage::gratuitous(MacAddr::new([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]), gateway);
//!
//! assert!(matches!(engine.process(&real), Some(DetectionEvent::HostDiscovered { .. })));
//! assert!(matches!(engine.process(&forged), Some(DetectionEvent::SpoofDetected { .. })));
//! ```

pub mod config;
pub mod decoder;
pub mod engine;
pub mod event;
pub mod shared;
pub mod stats;
pub mod table;
pub mod throttle;


pub use config::DetectorConfig;
pub use decoder::{AddressLayout, ArpMessage, ArpOpcode, DecoderConfig};
pub use engine::DetectionEngine;
pub use event::{CollectingSink, DetectionEvent, EventSink, Severity, TracingSink};
pub use shared::SharedBindingTable;
pub use stats::DetectorStats;
pub use table::{Binding, BindingStore, BindingTable, Outcome, DEFAULT_CAPACITY};
pub use throttle::AlertThrottle;
