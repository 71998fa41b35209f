//! Detection engine
//!
//! Feeds the sender pair of every request and reply into the binding store
//! and turns the outcome into a [`DetectionEvent`]. Target fields are logged
//! but never recorded: a request's target pair is what the sender is asking
//! about, not something it vouches for.

use arpguard_core::{Error, Result};
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::DetectorConfig;
use crate::decoder::{ArpMessage, ArpOpcode};
use crate::event::{DetectionEvent, EventSink};
use crate::stats::DetectorStats;
use crate::table::{BindingStore, BindingTable, Outcome};
use crate::throttle::AlertThrottle;

/// Binding tracker and classifier; owns its binding store
pub struct DetectionEngine<S: BindingStore = BindingTable> {
    store: S,
    config: DetectorConfig,
    throttle: Option<AlertThrottle>,
    stats: DetectorStats,
}

impl DetectionEngine<BindingTable> {
    /// Engine with its own table, sized from `config.capacity`
    pub fn new(config: DetectorConfig) -> Self {
        let store = BindingTable::new(config.capacity);
        Self::with_store(store, config)
    }
}

impl Default for DetectionEngine<BindingTable> {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl<S: BindingStore> DetectionEngine<S> {
    /// Engine over an injected store. The store's own bound applies;
    /// `config.capacity` is ignored here.
    pub fn with_store(store: S, config: DetectorConfig) -> Self {
        let throttle = config.suppress_window.map(AlertThrottle::new);
        Self {
            store,
            config,
            throttle,
            stats: DetectorStats::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }

    /// Alert suppression state, when a window is configured
    pub fn throttle(&self) -> Option<&AlertThrottle> {
        self.throttle.as_ref()
    }

    /// Decode a raw ARP payload and process it.
    ///
    /// Decode failures are counted and returned; the caller drops the
    /// message and moves on.
    pub fn process_payload(&mut self, payload: &[u8]) -> Result<Option<DetectionEvent>> {
        self.stats.messages += 1;

        let message = match ArpMessage::decode_with(payload, &self.config.decoder) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed += 1;
                return Err(e);
            }
        };

        Ok(self.classify(&message, Instant::now()))
    }

    /// Process an already decoded message
    pub fn process(&mut self, message: &ArpMessage) -> Option<DetectionEvent> {
        self.stats.messages += 1;
        self.classify(message, Instant::now())
    }

    /// Process with an explicit clock, for the suppression window
    pub fn process_at(&mut self, message: &ArpMessage, now: Instant) -> Option<DetectionEvent> {
        self.stats.messages += 1;
        self.classify(message, now)
    }

    /// Decode, process and forward any event to `sink`
    pub fn handle<K: EventSink>(&mut self, payload: &[u8], sink: &mut K) -> Result<()> {
        if let Some(event) = self.process_payload(payload)? {
            sink.emit(&event);
        }
        Ok(())
    }

    fn classify(&mut self, message: &ArpMessage, now: Instant) -> Option<DetectionEvent> {
        match message.opcode {
            ArpOpcode::Request => {
                self.stats.requests += 1;
                if message.is_gratuitous() {
                    debug!(
                        "Gratuitous ARP: {} announces itself at {}",
                        message.sender_ip, message.sender_mac
                    );
                } else {
                    debug!(
                        "ARP request: who has {}? tell {}",
                        message.target_ip, message.sender_ip
                    );
                }
            }
            ArpOpcode::Reply => {
                self.stats.replies += 1;
                debug!(
                    "ARP reply: {} is at {}",
                    message.sender_ip, message.sender_mac
                );
            }
            ArpOpcode::Other(op) => {
                self.stats.ignored += 1;
                trace!(opcode = op, sender = %message.sender_ip, "ignoring ARP opcode");
                return None;
            }
        }

        let address = message.sender_ip;
        let hardware = message.sender_mac;

        match self.store.observe(address, hardware) {
            Ok(Outcome::NewHost) => {
                self.stats.hosts_discovered += 1;
                Some(DetectionEvent::HostDiscovered { address, hardware })
            }
            Ok(Outcome::Refresh) => {
                self.stats.refreshes += 1;
                self.config
                    .trace_refresh
                    .then_some(DetectionEvent::BindingRefreshed { address, hardware })
            }
            Ok(Outcome::SpoofSuspected { previous, observed }) => {
                self.stats.spoofs_detected += 1;

                if let Some(throttle) = self.throttle.as_mut() {
                    if !throttle.permit(address, previous, observed, now) {
                        self.stats.alerts_suppressed += 1;
                        trace!(%address, %previous, %observed, "duplicate alert suppressed");
                        return None;
                    }
                }

                Some(DetectionEvent::SpoofDetected {
                    address,
                    previous,
                    observed,
                })
            }
            Err(Error::TableFull { capacity }) => {
                self.stats.capacity_rejections += 1;
                warn!(%address, capacity, "binding table full, observation dropped");
                Some(DetectionEvent::CapacityExceeded { address, capacity })
            }
            Err(e) => {
                // Stores only fail with TableFull; keep going regardless.
                warn!(%address, error = %e, "binding store error");
                None
            }
        }
    }
}
