//! Detector statistics

use std::fmt;

/// Counters kept by one detection engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorStats {
    /// Payloads handed to the engine
    pub messages: u64,
    /// Payloads the decoder rejected
    pub malformed: u64,
    pub requests: u64,
    pub replies: u64,
    /// Messages with an opcode other than request or reply
    pub ignored: u64,
    pub hosts_discovered: u64,
    pub refreshes: u64,
    pub spoofs_detected: u64,
    /// Spoof alerts withheld by the suppression window
    pub alerts_suppressed: u64,
    /// New addresses dropped because the table was full
    pub capacity_rejections: u64,
}

impl DetectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another engine's counters to these
    pub fn merge(&mut self, other: &DetectorStats) {
        self.messages += other.messages;
        self.malformed += other.malformed;
        self.requests += other.requests;
        self.replies += other.replies;
        self.ignored += other.ignored;
        self.hosts_discovered += other.hosts_discovered;
        self.refreshes += other.refreshes;
        self.spoofs_detected += other.spoofs_detected;
        self.alerts_suppressed += other.alerts_suppressed;
        self.capacity_rejections += other.capacity_rejections;
    }

    /// Percentage of messages that failed to decode
    pub fn malformed_rate(&self) -> f64 {
        if self.messages == 0 {
            return 0.0;
        }
        (self.malformed as f64 / self.messages as f64) * 100.0
    }
}

impl fmt::Display for DetectorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Messages: {} ({} requests, {} replies, {} ignored)\n\
             Malformed: {} ({:.2}%)\n\
             Hosts discovered: {}\n\
             Refreshes: {}\n\
             Spoofs detected: {} ({} suppressed)\n\
             Capacity rejections: {}",
            self.messages,
            self.requests,
            self.replies,
            self.ignored,
            self.malformed,
            self.malformed_rate(),
            self.hosts_discovered,
            self.refreshes,
            self.spoofs_detected,
            self.alerts_suppressed,
            self.capacity_rejections
        )
    }
}
