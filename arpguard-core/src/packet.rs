//! Packet types

use std::time::SystemTime;

/// A captured frame, link-layer header included
#[derive(Debug, Clone)]
pub struct Packet {
    /// When the packet was captured
    pub timestamp: SystemTime,
    /// Interface (or savefile) the packet was read from
    pub interface: String,
    /// Packet data (including all headers)
    pub data: Vec<u8>,
    /// Length on the wire (may exceed data.len() if truncated by snaplen)
    pub len: usize,
}

impl Packet {
    /// Create a new packet
    pub fn new(interface: String, data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            timestamp: SystemTime::now(),
            interface,
            data,
            len,
        }
    }

    /// Get packet length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the capture kept fewer bytes than were on the wire
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.len
    }
}
