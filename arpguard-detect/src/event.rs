//! Detection events and sinks

use arpguard_core::MacAddr;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{info, warn};

/// How loudly an event should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Alert => "ALERT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Event emitted by the detection engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvent {
    /// A sender pair was seen for an unknown address and admitted
    HostDiscovered { address: Ipv4Addr, hardware: MacAddr },
    /// A known binding was re-announced unchanged (only with refresh tracing)
    BindingRefreshed { address: Ipv4Addr, hardware: MacAddr },
    /// An address already bound to `previous` was claimed by `observed`
    SpoofDetected {
        address: Ipv4Addr,
        previous: MacAddr,
        observed: MacAddr,
    },
    /// The table is full and `address` could not be admitted
    CapacityExceeded { address: Ipv4Addr, capacity: usize },
}

impl DetectionEvent {
    pub fn severity(&self) -> Severity {
        match self {
            DetectionEvent::HostDiscovered { .. } | DetectionEvent::BindingRefreshed { .. } => {
                Severity::Info
            }
            DetectionEvent::CapacityExceeded { .. } => Severity::Warning,
            DetectionEvent::SpoofDetected { .. } => Severity::Alert,
        }
    }

    /// The network address the event concerns
    pub fn address(&self) -> Ipv4Addr {
        match self {
            DetectionEvent::HostDiscovered { address, .. }
            | DetectionEvent::BindingRefreshed { address, .. }
            | DetectionEvent::SpoofDetected { address, .. }
            | DetectionEvent::CapacityExceeded { address, .. } => *address,
        }
    }

    pub fn is_alert(&self) -> bool {
        self.severity() == Severity::Alert
    }
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionEvent::HostDiscovered { address, hardware } => {
                write!(f, "New host discovered: {} at {}", address, hardware)
            }
            DetectionEvent::BindingRefreshed { address, hardware } => {
                write!(f, "ARP refresh: {} is at {}", address, hardware)
            }
            DetectionEvent::SpoofDetected {
                address,
                previous,
                observed,
            } => write!(
                f,
                "ARP SPOOFING DETECTED! IP: {} is being claimed by {} (previously: {})",
                address, observed, previous
            ),
            DetectionEvent::CapacityExceeded { address, capacity } => write!(
                f,
                "Binding table full ({} entries); not tracking {}",
                capacity, address
            ),
        }
    }
}

/// Receiver of detection events.
///
/// Sinks own formatting, timestamps and persistence; the engine only hands
/// over well-formed values.
pub trait EventSink {
    fn emit(&mut self, event: &DetectionEvent);
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &DetectionEvent) {
        (**self).emit(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &DetectionEvent) {
        (**self).emit(event)
    }
}

/// Sink that reports through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &DetectionEvent) {
        match event {
            DetectionEvent::HostDiscovered { address, hardware } => {
                info!(%address, %hardware, "host discovered")
            }
            DetectionEvent::BindingRefreshed { address, hardware } => {
                info!(%address, %hardware, "binding refreshed")
            }
            DetectionEvent::SpoofDetected {
                address,
                previous,
                observed,
            } => warn!(%address, %previous, %observed, "ARP spoofing detected"),
            DetectionEvent::CapacityExceeded { address, capacity } => {
                warn!(%address, capacity, "binding table full")
            }
        }
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub events: Vec<DetectionEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> impl Iterator<Item = &DetectionEvent> {
        self.events.iter().filter(|e| e.is_alert())
    }
}

impl EventSink for CollectingSink {
    fn emit(&mut self, event: &DetectionEvent) {
        self.events.push(event.clone());
    }
}
