//! Detector configuration

use std::time::Duration;

use crate::decoder::DecoderConfig;
use crate::table::DEFAULT_CAPACITY;

/// Configuration for a detection engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Binding table bound; `None` for unbounded
    pub capacity: Option<usize>,
    /// Emit an informational event for every unchanged re-announcement
    pub trace_refresh: bool,
    /// Collapse identical spoof alerts inside this window; `None` alerts on
    /// every conflicting observation
    pub suppress_window: Option<Duration>,
    /// How ARP payloads are decoded
    pub decoder: DecoderConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_CAPACITY),
            trace_refresh: false,
            suppress_window: None,
            decoder: DecoderConfig::default(),
        }
    }
}
